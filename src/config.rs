//! Engine Configuration
//!
//! Everything needed to assemble an [`crate::InferenceService`] besides the
//! intent table itself: hidden layer sizes, the RNG seed, the text encoder
//! and the training schedule. All fields have defaults, so `{}` is a valid
//! configuration file.
//!
//! ## Example
//!
//! ```json
//! {
//!   "hidden_layers": [16],
//!   "seed": 42,
//!   "encoder": { "scheme": "letter_frequency" },
//!   "decoding": "argmax",
//!   "min_confidence": 0.4,
//!   "training": { "learning_rate": 0.05, "max_epochs": 2000 }
//! }
//! ```
//!
//! `decoding`, `min_confidence` and `fallback_response` override the values
//! in the intents file when present. Without an `encoder` entry the engine
//! uses a pattern-bag encoder built from the intents' own patterns.

use crate::encoder::{Encoder, FeatureScheme, DEFAULT_MAX_CHARS};
use crate::error::{NetError, Result};
use crate::intent::{IntentDecoding, IntentTable};
use crate::train::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Assembly parameters for an inference engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sizes of the hidden layers between encoder and output
    pub hidden_layers: Vec<usize>,
    /// Weight-initialisation seed; `None` draws one from the OS
    pub seed: Option<u64>,
    /// Feature scheme; `None` builds a pattern bag from the intents
    pub encoder: Option<FeatureScheme>,
    /// Characters of input kept before encoding
    pub max_chars: usize,
    pub decoding: Option<IntentDecoding>,
    pub min_confidence: Option<f32>,
    pub fallback_response: Option<String>,
    pub training: TrainingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![8],
            seed: None,
            encoder: None,
            max_chars: DEFAULT_MAX_CHARS,
            decoding: None,
            min_confidence: None,
            fallback_response: None,
            training: TrainingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_hidden_layers(mut self, hidden_layers: Vec<usize>) -> Self {
        self.hidden_layers = hidden_layers;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.contains(&0) {
            return Err(NetError::InvalidConfig(
                "hidden layer sizes must be positive".to_string(),
            ));
        }
        if self.max_chars == 0 {
            return Err(NetError::InvalidConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if let Some(threshold) = self.min_confidence {
            if !threshold.is_finite() {
                return Err(NetError::InvalidConfig(
                    "min_confidence must be finite".to_string(),
                ));
            }
        }
        self.training.validate()
    }

    /// Apply the intent-level overrides to `table`
    pub fn apply_to(&self, mut table: IntentTable) -> IntentTable {
        if let Some(decoding) = self.decoding {
            table = table.with_decoding(decoding);
        }
        if self.min_confidence.is_some() {
            table = table.with_min_confidence(self.min_confidence);
        }
        if let Some(response) = &self.fallback_response {
            table = table.with_fallback_response(response.clone());
        }
        table
    }

    /// Build the text encoder for `table`
    pub fn build_encoder(&self, table: &IntentTable) -> Result<Encoder> {
        let encoder = match &self.encoder {
            Some(scheme) => Encoder::from_scheme(scheme)?,
            None => table.pattern_encoder()?,
        };
        Ok(encoder.with_max_chars(self.max_chars))
    }

    /// Full layer-size list: `[inputs, hidden.., outputs]`
    pub fn topology(&self, inputs: usize, outputs: usize) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(inputs);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(outputs);
        sizes
    }
}
