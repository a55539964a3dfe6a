//! Error Taxonomy
//!
//! Every fallible operation in the engine returns [`Result`], built on a
//! single [`NetError`] enum. Shape and topology errors are detected before
//! any weight is touched, so a failed call leaves the network exactly as
//! it was.
//!
//! ## Variants
//!
//! - **ShapeMismatch**: vector/matrix dimensions disagree
//! - **InvalidTopology**: a network was requested with degenerate layer sizes
//! - **NoForwardState**: `backward` was handed a cache that does not belong
//!   to the layer's current weights
//! - **EmptyTrainingSet**: the trainer was asked to run on zero examples
//! - **NumericDivergence**: training produced NaN or infinite values
//! - **TrainingInProgress**: inference was attempted while the network is
//!   locked for training

use thiserror::Error;

/// Errors produced by the engine
#[derive(Debug, Error)]
pub enum NetError {
    /// Dimensions disagree at a tensor, layer or network boundary
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Operation that detected the mismatch
        context: &'static str,
        /// Dimension the operation required
        expected: String,
        /// Dimension it was given
        actual: String,
    },

    /// Layer sizes cannot form a network
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// `backward` called without a matching `forward` on the same layer
    #[error("backward called without a matching forward pass")]
    NoForwardState,

    /// Training requested with no examples
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// Loss or parameters became non-finite
    #[error("numeric divergence at epoch {epoch}, step {step}")]
    NumericDivergence {
        /// Epoch in which the divergence was detected (0 outside a trainer run)
        epoch: usize,
        /// Example index within the epoch
        step: usize,
    },

    /// The network is exclusively held by an active training run
    #[error("network is locked by an active training run")]
    TrainingInProgress,

    /// Trainer asked for a transition its current state does not allow
    #[error("invalid trainer transition: {0}")]
    InvalidTransition(String),

    /// A configuration value is out of range or inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure while reading configuration or writing logs
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NetError {
    /// Shorthand for a length mismatch between two vectors
    pub fn length(context: &'static str, expected: usize, actual: usize) -> Self {
        NetError::ShapeMismatch {
            context,
            expected: format!("length {}", expected),
            actual: format!("length {}", actual),
        }
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_names_both_dimensions() {
        let err = NetError::length("dot", 3, 4);
        let msg = err.to_string();
        assert!(msg.contains("dot"));
        assert!(msg.contains("length 3"));
        assert!(msg.contains("length 4"));
    }

    #[test]
    fn test_divergence_message() {
        let err = NetError::NumericDivergence { epoch: 7, step: 2 };
        assert_eq!(err.to_string(), "numeric divergence at epoch 7, step 2");
    }
}
