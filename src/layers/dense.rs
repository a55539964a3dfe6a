//! Dense Layer (Fully Connected)
//!
//! The dense layer is the only trainable building block of the engine. It
//! performs an affine transformation followed by an activation:
//!
//! ## Forward Pass
//!
//! ```text
//! Input:   x [in]
//! Weights: W [out, in]
//! Biases:  b [out]
//! Output:  y = tanh(W · x + b) [out]
//! ```
//!
//! ## Backward Pass
//!
//! Given `g = ∂L/∂y` from the next layer, using the chain rule:
//!
//! ```text
//! δ      = g ⊙ (1 - y²)         local gradient through tanh
//! grad_x = Wᵗ · δ               returned to the previous layer
//! W     -= lr · (δ ⊗ x)
//! b     -= lr · δ
//! ```
//!
//! `grad_x` is computed from the weights as they were during the forward
//! pass, before the update is applied.
//!
//! ## Forward Caches
//!
//! `forward` returns the output together with a [`DenseCache`] holding the
//! input and output the backward pass needs. `backward` takes the cache by
//! value, so a cache can be used exactly once. Each cache also records which
//! layer produced it and the version of that layer's weights; handing a
//! cache to a different layer, or to a layer whose weights changed since the
//! forward pass, fails with [`NetError::NoForwardState`].

use super::activation::Activation;
use crate::error::{NetError, Result};
use crate::tensor::{Matrix, Vector};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Half-width of the uniform range used for initial weights and biases
pub const INIT_RANGE: f32 = 0.5;

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

fn next_layer_id() -> u64 {
    NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Dense layer: `y = activation(W · x + b)`
///
/// A clone gets its own identity, so caches never cross between copies.
#[derive(Debug)]
pub struct DenseLayer {
    weights: Matrix,
    biases: Vector,
    activation: Activation,
    id: u64,
    version: u64,
}

impl DenseLayer {
    /// Create a layer with weights and biases drawn from `[-0.5, 0.5]`
    ///
    /// # Arguments
    ///
    /// * `input_size` - Length of the vectors this layer consumes
    /// * `output_size` - Number of units (rows of the weight matrix)
    /// * `activation` - Nonlinearity applied to the affine output
    /// * `rng` - Source of randomness; pass a seeded generator for reproducible runs
    pub fn new<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let weights = Matrix::random_uniform(output_size, input_size, INIT_RANGE, rng);
        let biases = Vector::from(
            (0..output_size)
                .map(|_| rng.random_range(-INIT_RANGE..=INIT_RANGE))
                .collect::<Vec<_>>(),
        );
        Self {
            weights,
            biases,
            activation,
            id: next_layer_id(),
            version: 0,
        }
    }

    /// Build a layer from explicit parameters
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the weight storage does not hold `rows * cols`
    /// values or `biases.len() != weights.rows`
    pub fn from_parts(weights: Matrix, biases: Vector, activation: Activation) -> Result<Self> {
        let (rows, cols) = weights.shape();
        if weights.data.len() != rows * cols {
            return Err(NetError::ShapeMismatch {
                context: "layer weights",
                expected: format!("{} elements ({}x{})", rows * cols, rows, cols),
                actual: format!("{} elements", weights.data.len()),
            });
        }
        if biases.len() != weights.rows {
            return Err(NetError::length("layer biases", weights.rows, biases.len()));
        }
        Ok(Self {
            weights,
            biases,
            activation,
            id: next_layer_id(),
            version: 0,
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols
    }

    pub fn output_size(&self) -> usize {
        self.weights.rows
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn biases(&self) -> &Vector {
        &self.biases
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// True when every weight and bias is finite
    pub fn is_finite(&self) -> bool {
        self.weights.is_finite() && self.biases.is_finite()
    }

    /// True if `cache` came from this layer's current weights
    pub fn accepts(&self, cache: &DenseCache) -> bool {
        cache.layer_id == self.id && cache.version == self.version
    }

    /// Inference-only forward pass (no cache)
    pub fn activate(&self, input: &Vector) -> Result<Vector> {
        let pre_activation = self.weights.matvec(input)?.add(&self.biases)?;
        Ok(self.activation.forward(&pre_activation))
    }

    /// Forward pass
    ///
    /// Computes `y = tanh(W · x + b)` and caches what `backward` needs.
    ///
    /// # Returns
    ///
    /// Tuple of (output, cache)
    pub fn forward(&self, input: &Vector) -> Result<(Vector, DenseCache)> {
        let output = self.activate(input)?;
        let cache = DenseCache {
            layer_id: self.id,
            version: self.version,
            input: input.clone(),
            output: output.clone(),
        };
        Ok((output, cache))
    }

    /// Backward pass with an in-place gradient descent update
    ///
    /// # Arguments
    ///
    /// * `grad_output` - `∂L/∂y`, same length as this layer's output
    /// * `cache` - Cache returned by the matching `forward`
    /// * `learning_rate` - Step size for the update
    ///
    /// # Returns
    ///
    /// `∂L/∂x`, the gradient to hand to the previous layer
    pub fn backward(
        &mut self,
        grad_output: &Vector,
        cache: DenseCache,
        learning_rate: f32,
    ) -> Result<Vector> {
        if !self.accepts(&cache) {
            return Err(NetError::NoForwardState);
        }
        if grad_output.len() != self.output_size() {
            return Err(NetError::length(
                "layer backward gradient",
                self.output_size(),
                grad_output.len(),
            ));
        }

        let local = grad_output.hadamard(&self.activation.derivative(&cache.output))?;
        let grad_input = self.weights.transpose_matvec(&local)?;

        let weight_step = Matrix::outer(&local, &cache.input).scale(learning_rate);
        self.weights = self.weights.sub(&weight_step)?;
        self.biases = self.biases.sub(&local.scale(learning_rate))?;
        self.version += 1;

        Ok(grad_input)
    }
}

impl Clone for DenseLayer {
    fn clone(&self) -> Self {
        Self {
            weights: self.weights.clone(),
            biases: self.biases.clone(),
            activation: self.activation,
            id: next_layer_id(),
            version: self.version,
        }
    }
}

impl PartialEq for DenseLayer {
    fn eq(&self, other: &Self) -> bool {
        self.weights == other.weights
            && self.biases == other.biases
            && self.activation == other.activation
    }
}

/// Values saved by [`DenseLayer::forward`] for a single backward step
#[derive(Debug)]
pub struct DenseCache {
    layer_id: u64,
    version: u64,
    input: Vector,
    output: Vector,
}

impl DenseCache {
    pub fn input(&self) -> &Vector {
        &self.input
    }

    pub fn output(&self) -> &Vector {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn layer(input: usize, output: usize, seed: u64) -> DenseLayer {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        DenseLayer::new(input, output, Activation::Tanh, &mut rng)
    }

    #[test]
    fn test_new_layer_shapes_and_range() {
        let l = layer(3, 4, 0);
        assert_eq!(l.weights().shape(), (4, 3));
        assert_eq!(l.biases().len(), 4);
        assert!(l.weights().data.iter().all(|w| w.abs() <= INIT_RANGE));
        assert!(l.biases().iter().all(|b| b.abs() <= INIT_RANGE));
    }

    #[test]
    fn test_from_parts_rejects_bias_mismatch() {
        let w = Matrix::zeros(2, 3);
        let b = Vector::zeros(3);
        assert!(matches!(
            DenseLayer::from_parts(w, b, Activation::Tanh),
            Err(NetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_weight_storage() {
        let w = Matrix {
            rows: 2,
            cols: 2,
            data: vec![0.0; 3],
        };
        assert!(matches!(
            DenseLayer::from_parts(w, Vector::zeros(2), Activation::Tanh),
            Err(NetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_clone_cache_is_rejected_by_original() {
        let mut original = layer(2, 1, 5);
        let mut copy = original.clone();
        assert_eq!(copy, original);

        let x = Vector::from(vec![1.0, -1.0]);
        let (_, copy_cache) = copy.forward(&x).unwrap();
        let (_, own_cache) = original.forward(&x).unwrap();
        assert!(!original.accepts(&copy_cache));
        assert!(matches!(
            original.backward(&Vector::from(vec![1.0]), copy_cache, 0.1),
            Err(NetError::NoForwardState)
        ));
        original.backward(&Vector::from(vec![1.0]), own_cache, 0.1).unwrap();

        let (_, cache) = copy.forward(&x).unwrap();
        copy.backward(&Vector::from(vec![1.0]), cache, 0.1).unwrap();
    }

    #[test]
    fn test_forward_known_values() {
        let w = Matrix::new(1, 2, vec![0.5, -0.5]).unwrap();
        let b = Vector::from(vec![0.1]);
        let l = DenseLayer::from_parts(w, b, Activation::Tanh).unwrap();
        let (y, cache) = l.forward(&Vector::from(vec![1.0, 0.0])).unwrap();
        assert!((y[0] - 0.6_f32.tanh()).abs() < 1e-6);
        assert_eq!(cache.input().as_slice(), &[1.0, 0.0]);
        assert_eq!(cache.output(), &y);
    }

    #[test]
    fn test_forward_rejects_wrong_input_length() {
        let l = layer(3, 2, 1);
        assert!(matches!(
            l.forward(&Vector::zeros(4)),
            Err(NetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_backward_matches_hand_computed_update() {
        let w = Matrix::new(1, 2, vec![0.2, 0.4]).unwrap();
        let b = Vector::from(vec![0.0]);
        let mut l = DenseLayer::from_parts(w, b, Activation::Tanh).unwrap();
        let x = Vector::from(vec![1.0, 2.0]);
        let (y, cache) = l.forward(&x).unwrap();

        let g = Vector::from(vec![0.5]);
        let grad_x = l.backward(&g, cache, 0.1).unwrap();

        let delta = 0.5 * (1.0 - y[0] * y[0]);
        // Input gradient uses the pre-update weights
        assert!((grad_x[0] - 0.2 * delta).abs() < 1e-6);
        assert!((grad_x[1] - 0.4 * delta).abs() < 1e-6);
        assert!((l.weights().data[0] - (0.2 - 0.1 * delta * 1.0)).abs() < 1e-6);
        assert!((l.weights().data[1] - (0.4 - 0.1 * delta * 2.0)).abs() < 1e-6);
        assert!((l.biases()[0] - (-0.1 * delta)).abs() < 1e-6);
    }

    #[test]
    fn test_backward_with_foreign_cache_fails() {
        let a = layer(2, 2, 1);
        let mut b = layer(2, 2, 2);
        let (_, cache) = a.forward(&Vector::zeros(2)).unwrap();
        let before = b.clone();
        assert!(matches!(
            b.backward(&Vector::zeros(2), cache, 0.1),
            Err(NetError::NoForwardState)
        ));
        assert_eq!(b, before);
    }

    #[test]
    fn test_backward_with_stale_cache_fails() {
        let mut l = layer(2, 1, 3);
        let x = Vector::from(vec![1.0, 1.0]);
        let (_, first) = l.forward(&x).unwrap();
        let (_, second) = l.forward(&x).unwrap();

        l.backward(&Vector::from(vec![1.0]), first, 0.1).unwrap();
        // Weights moved since `second` was produced
        assert!(matches!(
            l.backward(&Vector::from(vec![1.0]), second, 0.1),
            Err(NetError::NoForwardState)
        ));
    }

    #[test]
    fn test_backward_rejects_gradient_length_without_mutation() {
        let mut l = layer(2, 3, 4);
        let (_, cache) = l.forward(&Vector::zeros(2)).unwrap();
        let before = l.clone();
        assert!(matches!(
            l.backward(&Vector::zeros(2), cache, 0.1),
            Err(NetError::ShapeMismatch { .. })
        ));
        assert_eq!(l, before);
    }

    proptest! {
        #[test]
        fn prop_forward_output_in_open_unit_interval(
            input in prop::collection::vec(-3.0_f32..3.0, 4),
            seed in any::<u64>(),
        ) {
            let l = layer(4, 5, seed);
            let y = l.activate(&Vector::from(input)).unwrap();
            for v in y.iter() {
                prop_assert!(*v > -1.0 && *v < 1.0);
            }
        }
    }
}
