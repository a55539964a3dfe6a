//! Text Encoder
//!
//! Maps raw text into the fixed-length feature vector a [`crate::Network`]
//! consumes. Encoding is a pure function of the text and the configured
//! scheme: the same text always produces the same vector.
//!
//! ## Feature Schemes
//!
//! - **LetterFrequency**: 26 features, the number of occurrences of each
//!   ASCII letter `a..z` in the lowercased text
//! - **PatternBag**: one binary feature per known pattern; `1.0` when the
//!   pattern's tokens occur contiguously in the text's tokens
//!
//! ## Tokenization
//!
//! ```text
//! "Hello, how are you?"  →  ["hello", "how", "are", "you"]
//! ```
//!
//! Text is lowercased and split on every character that is not
//! alphanumeric or `_`.
//!
//! ## Edge Cases
//!
//! - Empty text encodes to a zero vector of the configured length
//! - Text longer than `max_chars` characters is truncated before encoding

use crate::error::{NetError, Result};
use crate::tensor::Vector;
use serde::{Deserialize, Serialize};

/// Number of features produced by [`FeatureScheme::LetterFrequency`]
pub const ALPHABET_LEN: usize = 26;

/// Default character limit applied before encoding
pub const DEFAULT_MAX_CHARS: usize = 1024;

/// Which feature vector the encoder produces
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum FeatureScheme {
    /// Occurrence count of each of the 26 ASCII letters
    #[default]
    LetterFrequency,
    /// Binary presence of each known pattern
    PatternBag { patterns: Vec<String> },
}

/// Split text into lowercase word tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Stateless text-to-vector encoder
#[derive(Clone, Debug, PartialEq)]
pub struct Encoder {
    scheme: FeatureScheme,
    // Tokenized form of each pattern, parallel to the PatternBag list
    pattern_tokens: Vec<Vec<String>>,
    max_chars: usize,
}

impl Encoder {
    /// Letter-count encoder (26 features)
    pub fn letter_frequency() -> Self {
        Self {
            scheme: FeatureScheme::LetterFrequency,
            pattern_tokens: Vec::new(),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    /// Pattern-bag encoder over `patterns`
    ///
    /// Patterns are normalised through [`tokenize`]; duplicates and patterns
    /// with no word characters are dropped, keeping first-seen order.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if no usable pattern remains
    pub fn pattern_bag<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalised: Vec<String> = Vec::new();
        let mut pattern_tokens: Vec<Vec<String>> = Vec::new();
        for pattern in patterns {
            let tokens = tokenize(pattern.as_ref());
            if tokens.is_empty() {
                continue;
            }
            let joined = tokens.join(" ");
            if normalised.contains(&joined) {
                continue;
            }
            normalised.push(joined);
            pattern_tokens.push(tokens);
        }
        if normalised.is_empty() {
            return Err(NetError::InvalidConfig(
                "pattern bag needs at least one pattern".to_string(),
            ));
        }
        Ok(Self {
            scheme: FeatureScheme::PatternBag {
                patterns: normalised,
            },
            pattern_tokens,
            max_chars: DEFAULT_MAX_CHARS,
        })
    }

    /// Build an encoder from a serialized scheme
    pub fn from_scheme(scheme: &FeatureScheme) -> Result<Self> {
        match scheme {
            FeatureScheme::LetterFrequency => Ok(Self::letter_frequency()),
            FeatureScheme::PatternBag { patterns } => Self::pattern_bag(patterns),
        }
    }

    /// Override the truncation limit
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn scheme(&self) -> &FeatureScheme {
        &self.scheme
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Length of every vector this encoder returns
    pub fn feature_len(&self) -> usize {
        match &self.scheme {
            FeatureScheme::LetterFrequency => ALPHABET_LEN,
            FeatureScheme::PatternBag { patterns } => patterns.len(),
        }
    }

    /// Encode `text` into a vector of length [`Encoder::feature_len`]
    pub fn encode(&self, text: &str) -> Vector {
        let truncated: String = text.chars().take(self.max_chars).collect();
        match &self.scheme {
            FeatureScheme::LetterFrequency => letter_counts(&truncated),
            FeatureScheme::PatternBag { .. } => self.pattern_presence(&truncated),
        }
    }

    fn pattern_presence(&self, text: &str) -> Vector {
        let tokens = tokenize(text);
        let data: Vec<f32> = self
            .pattern_tokens
            .iter()
            .map(|pattern| {
                let found = tokens
                    .windows(pattern.len())
                    .any(|window| window == pattern.as_slice());
                if found {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        Vector::from(data)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::letter_frequency()
    }
}

fn letter_counts(text: &str) -> Vector {
    let mut counts = vec![0.0_f32; ALPHABET_LEN];
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() {
            counts[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    Vector::from(counts)
}
