//! Activation Functions
//!
//! Activations are the nonlinearity applied after each layer's affine
//! transform. The engine currently ships one: the hyperbolic tangent.
//!
//! ## Tanh
//!
//! ```text
//! tanh(x) = (eˣ - e⁻ˣ) / (eˣ + e⁻ˣ)      range (-1, 1)
//! tanh'(x) = 1 - tanh(x)²
//! ```
//!
//! The derivative is expressed through the activated output `y = tanh(x)`,
//! so the backward pass only needs the layer's cached output, not its
//! pre-activation.

use crate::tensor::Vector;
use serde::{Deserialize, Serialize};

/// Activation function selector
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Hyperbolic tangent
    #[default]
    Tanh,
}

impl Activation {
    /// Apply the activation element-wise
    pub fn forward(self, pre_activation: &Vector) -> Vector {
        match self {
            Activation::Tanh => pre_activation.map(f32::tanh),
        }
    }

    /// Derivative with respect to the input, evaluated from the output `y`
    pub fn derivative(self, output: &Vector) -> Vector {
        match self {
            Activation::Tanh => output.map(|y| 1.0 - y * y),
        }
    }
}
