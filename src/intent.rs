//! Intents and Response Selection
//!
//! An [`Intent`] is a labelled group of example phrases (`patterns`) with
//! candidate replies (`responses`). An [`IntentTable`] is the static set of
//! intents a bot knows about: it supplies training targets for the network
//! and turns the network's output back into an intent.
//!
//! ## Decoding Schemes
//!
//! ```text
//! ScalarIndex   output [1]      index = round(output[0] · count)
//!               target for intent i = i / count
//!
//! Argmax        output [count]  index = argmax(output)
//!               target for intent i = one-hot(i)
//! ```
//!
//! Scalar decoding rounds to the nearest index with ties going to the lower
//! one, and clamps out-of-range values to the first or last intent. An
//! undertrained network routinely produces such values, so they are not an
//! error.
//!
//! ## Confidence
//!
//! With `min_confidence` set, predictions below the threshold classify as
//! no intent and [`IntentTable::respond`] falls back to the table's
//! `fallback_response`.
//!
//! - ScalarIndex: `1 - 2·|x - index|`, clamped to `[0, 1]`
//! - Argmax: the winning output value
//!
//! ## JSON Format
//!
//! ```json
//! {
//!   "intents": [
//!     { "tag": "greeting", "patterns": ["hi", "hello"], "responses": ["Hello!"] }
//!   ],
//!   "decoding": "argmax",
//!   "min_confidence": 0.3
//! }
//! ```

use crate::encoder::Encoder;
use crate::error::{NetError, Result};
use crate::network::Network;
use crate::tensor::Vector;
use crate::train::TrainingExample;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Reply used when no intent matches or the matched intent has no responses
pub const FALLBACK_RESPONSE: &str = "I'm not sure how to respond to that.";

/// A labelled group of patterns with candidate responses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub tag: String,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

impl Intent {
    pub fn new<P, R>(tag: &str, patterns: P, responses: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            tag: tag.to_string(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            responses: responses.into_iter().map(Into::into).collect(),
        }
    }
}

/// How network output maps back to an intent index
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentDecoding {
    /// Single output scaled by the intent count and rounded
    #[default]
    ScalarIndex,
    /// One output per intent, highest wins
    Argmax,
}

/// Static, read-only set of intents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentTable {
    intents: Vec<Intent>,
    #[serde(default)]
    decoding: IntentDecoding,
    #[serde(default)]
    min_confidence: Option<f32>,
    #[serde(default = "default_fallback")]
    fallback_response: String,
}

fn default_fallback() -> String {
    FALLBACK_RESPONSE.to_string()
}

impl IntentTable {
    /// Build a table using scalar-index decoding and no confidence threshold
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `intents` is empty, a tag repeats, or an intent
    /// has no patterns
    pub fn new(intents: Vec<Intent>) -> Result<Self> {
        let table = Self {
            intents,
            decoding: IntentDecoding::default(),
            min_confidence: None,
            fallback_response: default_fallback(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Parse a table from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: IntentTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_decoding(mut self, decoding: IntentDecoding) -> Self {
        self.decoding = decoding;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: Option<f32>) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_fallback_response(mut self, response: impl Into<String>) -> Self {
        self.fallback_response = response.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.intents.is_empty() {
            return Err(NetError::InvalidConfig(
                "intent table needs at least one intent".to_string(),
            ));
        }
        for (i, intent) in self.intents.iter().enumerate() {
            if intent.patterns.is_empty() {
                return Err(NetError::InvalidConfig(format!(
                    "intent '{}' has no patterns",
                    intent.tag
                )));
            }
            if self.intents[..i].iter().any(|other| other.tag == intent.tag) {
                return Err(NetError::InvalidConfig(format!(
                    "duplicate intent tag '{}'",
                    intent.tag
                )));
            }
        }
        if let Some(threshold) = self.min_confidence {
            if !threshold.is_finite() {
                return Err(NetError::InvalidConfig(
                    "min_confidence must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn get(&self, index: usize) -> Option<&Intent> {
        self.intents.get(index)
    }

    pub fn find(&self, tag: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.tag == tag)
    }

    pub fn decoding(&self) -> IntentDecoding {
        self.decoding
    }

    pub fn min_confidence(&self) -> Option<f32> {
        self.min_confidence
    }

    pub fn fallback_response(&self) -> &str {
        &self.fallback_response
    }

    /// Every pattern of every intent, in table order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.intents
            .iter()
            .flat_map(|intent| intent.patterns.iter().map(String::as_str))
    }

    /// Pattern-bag encoder whose vocabulary is this table's patterns
    pub fn pattern_encoder(&self) -> Result<Encoder> {
        Encoder::pattern_bag(self.patterns())
    }

    /// Number of network outputs the configured decoding expects
    pub fn output_size(&self) -> usize {
        match self.decoding {
            IntentDecoding::ScalarIndex => 1,
            IntentDecoding::Argmax => self.intents.len(),
        }
    }

    /// Training target for the intent at `index`
    pub fn target(&self, index: usize) -> Result<Vector> {
        if index >= self.intents.len() {
            return Err(NetError::length("intent index", self.intents.len(), index));
        }
        Ok(match self.decoding {
            IntentDecoding::ScalarIndex => {
                Vector::from(vec![index as f32 / self.intents.len() as f32])
            }
            IntentDecoding::Argmax => {
                let mut one_hot = Vector::zeros(self.intents.len());
                one_hot.data[index] = 1.0;
                one_hot
            }
        })
    }

    /// One example per pattern, encoded with `encoder`
    pub fn training_examples(&self, encoder: &Encoder) -> Result<Vec<TrainingExample>> {
        let mut examples = Vec::new();
        for (index, intent) in self.intents.iter().enumerate() {
            let target = self.target(index)?;
            for pattern in &intent.patterns {
                examples.push(TrainingExample::new(encoder.encode(pattern), target.clone()));
            }
        }
        Ok(examples)
    }

    /// Decode a network output into `(intent index, confidence)`
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `output` does not have [`IntentTable::output_size`] elements
    pub fn decode(&self, output: &Vector) -> Result<(usize, f32)> {
        if output.len() != self.output_size() {
            return Err(NetError::length("intent decoding", self.output_size(), output.len()));
        }
        match self.decoding {
            IntentDecoding::ScalarIndex => {
                let scaled = output.get(0).unwrap_or(0.0) * self.intents.len() as f32;
                let index = nearest_index(scaled, self.intents.len());
                let distance = (scaled - index as f32).abs();
                let confidence = if distance.is_finite() {
                    (1.0 - 2.0 * distance).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                Ok((index, confidence))
            }
            IntentDecoding::Argmax => {
                let index = output.argmax().unwrap_or(0);
                Ok((index, output.get(index).unwrap_or(0.0)))
            }
        }
    }

    /// Run `network` on an encoded input and pick the matching intent
    ///
    /// Returns `None` only when a confidence threshold is configured and the
    /// prediction falls below it.
    pub fn classify(&self, input: &Vector, network: &Network) -> Result<Option<&Intent>> {
        let output = network.forward(input)?;
        let (index, confidence) = self.decode(&output)?;
        if let Some(threshold) = self.min_confidence {
            if confidence < threshold {
                tracing::debug!(index, confidence, threshold, "prediction below confidence threshold");
                return Ok(None);
            }
        }
        Ok(self.intents.get(index))
    }

    /// Pick one of the intent's responses uniformly at random
    ///
    /// Falls back to the table's fallback response (by default
    /// [`FALLBACK_RESPONSE`]) when `intent` is `None` or has no responses.
    pub fn respond<R: Rng>(&self, intent: Option<&Intent>, rng: &mut R) -> String {
        intent
            .and_then(|intent| intent.responses.choose(rng))
            .cloned()
            .unwrap_or_else(|| self.fallback_response.clone())
    }
}

/// Nearest integer index for `x`, ties to the lower index, clamped to `[0, count)`
pub fn nearest_index(x: f32, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let last = count - 1;
    if x.is_nan() || x <= 0.0 {
        return 0;
    }
    if x >= last as f32 {
        return last;
    }
    let floor = x.floor();
    let rounded = if x - floor > 0.5 { floor + 1.0 } else { floor };
    (rounded as usize).min(last)
}
