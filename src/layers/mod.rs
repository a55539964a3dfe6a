//! Neural Network Layers
//!
//! This module contains the trainable layer used by [`crate::network::Network`]
//! and the activation it applies.
//!
//! ## Layers
//!
//! - **activation**: tanh activation (forward and derivative)
//! - **dense**: fully connected layer with in-place SGD update
//!
//! ## Design Pattern
//!
//! Every trainable layer follows the same shape:
//!
//! ```rust,ignore
//! impl Layer {
//!     pub fn forward(&self, x: &Vector) -> Result<(Vector, Cache)> { }
//!     pub fn backward(&mut self, grad: &Vector, cache: Cache, lr: f32) -> Result<Vector> { }
//! }
//! ```
//!
//! The cache is an explicit value rather than hidden state on the layer,
//! so the order of forward and backward calls is visible in the types.

pub mod activation;
pub mod dense;

pub use activation::Activation;
pub use dense::{DenseCache, DenseLayer, INIT_RANGE};
