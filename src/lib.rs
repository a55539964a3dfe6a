//! Touchstone: A Tiny Neural Network Engine
//!
//! A fully-connected feed-forward network with tanh activations, trained
//! online by backpropagation, plus the plumbing to turn it into a small
//! intent-classifying chat bot. Everything is implemented from scratch on a
//! hand-written [`Vector`]/[`Matrix`] pair.
//!
//! # Modules
//!
//! - [`tensor`] - Vector and matrix primitives
//! - [`layers`] - Dense layer with explicit forward caches
//! - [`network`] - Layer stack, forward pass and single-example training step
//! - [`encoder`] - Text to fixed-length feature vectors
//! - [`intent`] - Intent tables, output decoding and response selection
//! - [`train`] - Epoch loop with pause/resume and stop conditions
//! - [`training_logger`] - CSV loss log
//! - [`inference`] - Lock-guarded prediction service
//! - [`config`] - JSON engine configuration
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```rust
//! use touchstone::{Network, Trainer, TrainingConfig, TrainingExample, Vector};
//!
//! // Logical AND on a [2, 4, 1] network
//! let mut net = Network::seeded(&[2, 4, 1], 42).unwrap();
//! let table: [([f32; 2], f32); 4] = [([0.0, 0.0], 0.0), ([1.0, 1.0], 1.0), ([1.0, 0.0], 0.0), ([0.0, 1.0], 0.0)];
//! let examples: Vec<TrainingExample> = table
//!     .iter()
//!     .map(|(x, y)| TrainingExample::new(Vector::from(x.to_vec()), Vector::from(vec![*y])))
//!     .collect();
//!
//! let mut trainer = Trainer::new(TrainingConfig::default().with_max_epochs(500));
//! trainer.run(&mut net, &examples, || false).unwrap();
//!
//! let yes = net.forward(&Vector::from(vec![1.0, 1.0])).unwrap();
//! assert!(yes[0] > 0.5);
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod inference;
pub mod intent;
pub mod layers;
pub mod network;
pub mod tensor;
pub mod train;
pub mod training_logger;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use encoder::{Encoder, FeatureScheme};
pub use error::{NetError, Result};
pub use inference::{InferenceService, PredictMode, Prediction};
pub use intent::{Intent, IntentDecoding, IntentTable};
pub use layers::{Activation, DenseCache, DenseLayer};
pub use network::{Network, NetworkCache};
pub use tensor::{Matrix, Vector};
pub use train::{
    evaluate, LossHistory, StopReason, Trainer, TrainerState, TrainingConfig, TrainingExample,
};
pub use training_logger::TrainingLogger;
