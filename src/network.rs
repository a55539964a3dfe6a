//! Feed-Forward Network
//!
//! A [`Network`] is an ordered stack of [`DenseLayer`]s where each layer's
//! input size equals the previous layer's output size.
//!
//! ## Architecture Overview
//!
//! ```text
//! layer_sizes = [2, 4, 1]
//!
//! input [2]
//!     ↓
//! Dense 2→4, tanh   (weights 4x2)
//!     ↓
//! Dense 4→1, tanh   (weights 1x4)
//!     ↓
//! output [1]
//! ```
//!
//! ## Online Training
//!
//! [`Network::train_step`] performs one stochastic gradient descent update
//! on a single example:
//!
//! ```text
//! y     = forward(x)
//! error = target - y
//! loss  = mean(error²)
//! grad  = y - target                (∂½‖target - y‖²/∂y)
//! for layer in reverse: grad = layer.backward(grad)
//! ```
//!
//! The output layer folds the tanh derivative in, so the gradient entering
//! the last layer's weights is `-(error ⊙ (1 - y²))`.
//!
//! A single-layer, single-output network (`[n, 1]`) is the classic online
//! perceptron-style predictor; no separate type is needed for it.
//!
//! ## Example
//!
//! ```rust
//! use touchstone::{Network, Vector};
//!
//! let mut net = Network::seeded(&[2, 3, 1], 42).unwrap();
//! let x = Vector::from(vec![1.0, 0.0]);
//! let t = Vector::from(vec![0.5]);
//! let loss = net.train_step(&x, &t, 0.1).unwrap();
//! assert!(loss >= 0.0);
//! ```

use crate::error::{NetError, Result};
use crate::layers::{Activation, DenseCache, DenseLayer};
use crate::tensor::Vector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Ordered stack of dense layers with a continuous shape chain
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    layers: Vec<DenseLayer>,
}

impl Network {
    /// Create a network from layer sizes using tanh activations
    ///
    /// # Arguments
    ///
    /// * `layer_sizes` - `[input, hidden.., output]`; at least two entries, all non-zero
    /// * `rng` - Random source for weight initialization
    ///
    /// # Errors
    ///
    /// `InvalidTopology` if fewer than two sizes are given or any size is zero
    pub fn create<R: Rng>(layer_sizes: &[usize], rng: &mut R) -> Result<Self> {
        Self::create_with(layer_sizes, Activation::Tanh, rng)
    }

    /// Create a network with an explicit activation selector
    pub fn create_with<R: Rng>(
        layer_sizes: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        validate_topology(layer_sizes)?;
        let layers = layer_sizes
            .windows(2)
            .map(|pair| DenseLayer::new(pair[0], pair[1], activation, rng))
            .collect();
        Ok(Self { layers })
    }

    /// Create a network with a ChaCha8 generator seeded from `seed`
    pub fn seeded(layer_sizes: &[usize], seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::create(layer_sizes, &mut rng)
    }

    /// Assemble a network from pre-built layers
    ///
    /// # Errors
    ///
    /// `InvalidTopology` if `layers` is empty, `ShapeMismatch` if adjacent
    /// layers do not chain
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(NetError::InvalidTopology(
                "a network needs at least one layer".to_string(),
            ));
        }
        for pair in layers.windows(2) {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(NetError::length(
                    "layer chain",
                    pair[0].output_size(),
                    pair[1].input_size(),
                ));
            }
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Length of the vectors `forward` accepts
    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::input_size)
    }

    /// Length of the vectors `forward` returns
    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::output_size)
    }

    /// The `[input, hidden.., output]` sizes this network was built from
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.input_size()];
        sizes.extend(self.layers.iter().map(DenseLayer::output_size));
        sizes
    }

    /// Total number of weights and biases
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights().data.len() + l.biases().len())
            .sum()
    }

    /// True when every parameter is finite
    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(DenseLayer::is_finite)
    }

    fn check_input(&self, input: &Vector) -> Result<()> {
        if input.len() != self.input_size() {
            return Err(NetError::length("network input", self.input_size(), input.len()));
        }
        Ok(())
    }

    /// Inference: chain every layer's activation in order
    ///
    /// Reads the weights only; calling it twice on the same input yields
    /// bit-identical output.
    pub fn forward(&self, input: &Vector) -> Result<Vector> {
        self.check_input(input)?;
        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.activate(&x)?;
        }
        Ok(x)
    }

    /// Forward pass that also returns per-layer caches for [`Network::backward`]
    pub fn forward_with_cache(&self, input: &Vector) -> Result<(Vector, NetworkCache)> {
        self.check_input(input)?;
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut x = input.clone();
        for layer in &self.layers {
            let (y, cache) = layer.forward(&x)?;
            caches.push(cache);
            x = y;
        }
        Ok((x, NetworkCache { layers: caches }))
    }

    /// Backpropagate `grad_output` (∂L/∂output) and update every layer
    ///
    /// # Returns
    ///
    /// Gradient with respect to the network input
    pub fn backward(
        &mut self,
        grad_output: &Vector,
        cache: NetworkCache,
        learning_rate: f32,
    ) -> Result<Vector> {
        let complete = cache.layers.len() == self.layers.len()
            && self.layers.iter().zip(&cache.layers).all(|(l, c)| l.accepts(c));
        if !complete {
            return Err(NetError::NoForwardState);
        }
        if grad_output.len() != self.output_size() {
            return Err(NetError::length(
                "network backward gradient",
                self.output_size(),
                grad_output.len(),
            ));
        }

        let mut grad = grad_output.clone();
        for (layer, layer_cache) in self.layers.iter_mut().zip(cache.layers).rev() {
            grad = layer.backward(&grad, layer_cache, learning_rate)?;
        }
        Ok(grad)
    }

    /// One online training step on a single example
    ///
    /// # Arguments
    ///
    /// * `input` - Example input, length `input_size()`
    /// * `target` - Desired output, length `output_size()`
    /// * `learning_rate` - SGD step size
    ///
    /// # Returns
    ///
    /// Mean squared error of the prediction made before the update
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if `input` or `target` has the wrong length (no
    ///   weights are touched)
    /// - `NumericDivergence` if the loss or any updated parameter is not finite
    pub fn train_step(&mut self, input: &Vector, target: &Vector, learning_rate: f32) -> Result<f32> {
        self.check_input(input)?;
        if target.len() != self.output_size() {
            return Err(NetError::length("training target", self.output_size(), target.len()));
        }

        let (output, cache) = self.forward_with_cache(input)?;
        let error = target.sub(&output)?;
        let loss = error.mean_square();

        self.backward(&error.scale(-1.0), cache, learning_rate)?;

        if !loss.is_finite() || !self.is_finite() {
            return Err(NetError::NumericDivergence { epoch: 0, step: 0 });
        }
        Ok(loss)
    }
}

/// Per-layer caches from one [`Network::forward_with_cache`] call
#[derive(Debug)]
pub struct NetworkCache {
    layers: Vec<DenseCache>,
}

fn validate_topology(layer_sizes: &[usize]) -> Result<()> {
    if layer_sizes.len() < 2 {
        return Err(NetError::InvalidTopology(format!(
            "need at least 2 layer sizes, got {}",
            layer_sizes.len()
        )));
    }
    if let Some(pos) = layer_sizes.iter().position(|&s| s == 0) {
        return Err(NetError::InvalidTopology(format!(
            "layer size at position {} is zero",
            pos
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Matrix;

    fn and_examples() -> Vec<(Vector, Vector)> {
        vec![
            (Vector::from(vec![0.0, 0.0]), Vector::from(vec![0.0])),
            (Vector::from(vec![1.0, 1.0]), Vector::from(vec![1.0])),
            (Vector::from(vec![1.0, 0.0]), Vector::from(vec![0.0])),
            (Vector::from(vec![0.0, 1.0]), Vector::from(vec![0.0])),
        ]
    }

    #[test]
    fn test_create_rejects_single_size() {
        assert!(matches!(
            Network::seeded(&[3], 0),
            Err(NetError::InvalidTopology(_))
        ));
        assert!(matches!(
            Network::seeded(&[], 0),
            Err(NetError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_create_rejects_zero_size() {
        assert!(matches!(
            Network::seeded(&[3, 0, 1], 0),
            Err(NetError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_create_single_layer_shape() {
        let net = Network::seeded(&[3, 4], 0).unwrap();
        assert_eq!(net.layers().len(), 1);
        assert_eq!(net.layers()[0].weights().shape(), (4, 3));
        assert_eq!(net.layer_sizes(), vec![3, 4]);
        assert_eq!(net.parameter_count(), 4 * 3 + 4);
    }

    #[test]
    fn test_shape_chain_is_continuous() {
        let net = Network::seeded(&[5, 7, 3, 2], 9).unwrap();
        for pair in net.layers().windows(2) {
            assert_eq!(pair[0].output_size(), pair[1].input_size());
        }
        assert_eq!(net.input_size(), 5);
        assert_eq!(net.output_size(), 2);
    }

    #[test]
    fn test_from_layers_rejects_broken_chain() {
        let a = DenseLayer::from_parts(Matrix::zeros(3, 2), Vector::zeros(3), Activation::Tanh)
            .unwrap();
        let b = DenseLayer::from_parts(Matrix::zeros(1, 4), Vector::zeros(1), Activation::Tanh)
            .unwrap();
        assert!(matches!(
            Network::from_layers(vec![a, b]),
            Err(NetError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Network::from_layers(vec![]),
            Err(NetError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = Network::seeded(&[4, 6, 2], 123).unwrap();
        let b = Network::seeded(&[4, 6, 2], 123).unwrap();
        let c = Network::seeded(&[4, 6, 2], 124).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_forward_is_pure() {
        let net = Network::seeded(&[3, 5, 2], 7).unwrap();
        let x = Vector::from(vec![0.3, -0.2, 0.9]);
        let first = net.forward(&x).unwrap();
        let second = net.forward(&x).unwrap();
        assert_eq!(
            first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_forward_rejects_wrong_input_length() {
        let net = Network::seeded(&[3, 2], 7).unwrap();
        assert!(matches!(
            net.forward(&Vector::zeros(2)),
            Err(NetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_train_step_rejects_bad_target_without_mutation() {
        let mut net = Network::seeded(&[2, 3, 1], 5).unwrap();
        let snapshot = net.clone();
        let result = net.train_step(&Vector::zeros(2), &Vector::zeros(2), 0.1);
        assert!(matches!(result, Err(NetError::ShapeMismatch { .. })));
        assert_eq!(net, snapshot);
    }

    #[test]
    fn test_backward_with_cache_from_other_network_fails() {
        let a = Network::seeded(&[2, 2], 1).unwrap();
        let mut b = Network::seeded(&[2, 2], 1).unwrap();
        let (_, cache) = a.forward_with_cache(&Vector::zeros(2)).unwrap();
        assert!(matches!(
            b.backward(&Vector::zeros(2), cache, 0.1),
            Err(NetError::NoForwardState)
        ));
    }

    #[test]
    fn test_loss_strictly_decreases_on_fixed_example() {
        let mut net = Network::seeded(&[2, 3, 1], 11).unwrap();
        let x = Vector::from(vec![1.0, 0.0]);
        let t = Vector::from(vec![0.5]);

        let mut previous = f32::INFINITY;
        for step in 0..20 {
            let loss = net.train_step(&x, &t, 0.05).unwrap();
            assert!(loss < previous, "loss went up at step {}: {} -> {}", step, previous, loss);
            previous = loss;
        }
    }

    #[test]
    fn test_learns_logical_and() {
        let mut net = Network::seeded(&[2, 4, 1], 42).unwrap();
        let examples = and_examples();
        for _ in 0..500 {
            for (x, t) in &examples {
                net.train_step(x, t, 0.1).unwrap();
            }
        }
        let on = net.forward(&Vector::from(vec![1.0, 1.0])).unwrap();
        let off = net.forward(&Vector::from(vec![0.0, 0.0])).unwrap();
        assert!(on[0] > 0.5, "AND(1,1) = {}", on[0]);
        assert!(off[0] < 0.5, "AND(0,0) = {}", off[0]);
    }

    #[test]
    fn test_single_output_network_acts_as_online_predictor() {
        // y ≈ tanh(w·x + b) learns a sign-like target
        let mut net = Network::seeded(&[1, 1], 3).unwrap();
        for _ in 0..300 {
            net.train_step(&Vector::from(vec![1.0]), &Vector::from(vec![0.8]), 0.1)
                .unwrap();
            net.train_step(&Vector::from(vec![-1.0]), &Vector::from(vec![-0.8]), 0.1)
                .unwrap();
        }
        let pos = net.forward(&Vector::from(vec![1.0])).unwrap();
        let neg = net.forward(&Vector::from(vec![-1.0])).unwrap();
        assert!((pos[0] - 0.8).abs() < 0.1);
        assert!((neg[0] + 0.8).abs() < 0.1);
    }

    #[test]
    fn test_overflowing_update_reports_divergence() {
        let layer =
            DenseLayer::from_parts(Matrix::zeros(1, 1), Vector::zeros(1), Activation::Tanh)
                .unwrap();
        let mut net = Network::from_layers(vec![layer]).unwrap();
        // lr * input overflows f32, so the updated weight becomes infinite
        let result = net.train_step(&Vector::from(vec![1e20]), &Vector::from(vec![1.0]), 1e30);
        assert!(matches!(result, Err(NetError::NumericDivergence { .. })));
        assert!(!net.is_finite());
    }
}
