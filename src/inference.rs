//! Inference Service
//!
//! The externally-facing entry point of the engine. Given raw text it runs
//! the full pipeline:
//!
//! ```text
//! text → Encoder → Vector → Network::forward → IntentTable::decode → response
//!                                            ↘ (scalar mode) → output[0]
//! ```
//!
//! ## Locking
//!
//! The network lives behind an `Arc<RwLock<_>>`. Any number of predictions
//! may read it at once; a training run takes the write lock for its whole
//! duration. Predictions never wait for training: while the lock is held
//! exclusively, [`InferenceService::predict`] fails fast with
//! `TrainingInProgress` rather than observe half-trained weights.
//!
//! ## Modes
//!
//! - **Intent**: the output is decoded into an intent and one of its
//!   responses is returned
//! - **Scalar**: the single output value is returned as-is, which makes a
//!   one-layer `[n, 1]` network behave as a simple online predictor

use crate::config::EngineConfig;
use crate::encoder::Encoder;
use crate::error::{NetError, Result};
use crate::intent::IntentTable;
use crate::network::Network;
use crate::train::{LossHistory, Trainer, TrainingExample};
use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Reply used by [`InferenceService::reply`] when a prediction fails
pub const ERROR_RESPONSE: &str = "I encountered an error processing your request.";

/// What a prediction returns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictMode {
    Intent,
    Scalar,
}

/// Result of [`InferenceService::predict`]
#[derive(Clone, Debug, PartialEq)]
pub enum Prediction {
    Response(String),
    Scalar(f32),
}

enum Mode {
    Intent(IntentTable),
    Scalar,
}

/// Shared, lock-guarded network plus the configuration to query it
pub struct InferenceService {
    network: Arc<RwLock<Network>>,
    encoder: Encoder,
    mode: Mode,
    rng: Mutex<ChaCha8Rng>,
}

impl InferenceService {
    /// Intent-mode service over an existing network
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the network's input does not match the encoder's
    /// feature length or its output does not match the table's decoding
    pub fn new(network: Network, encoder: Encoder, intents: IntentTable, seed: u64) -> Result<Self> {
        check_input(&network, &encoder)?;
        if network.output_size() != intents.output_size() {
            return Err(NetError::length(
                "intent output",
                intents.output_size(),
                network.output_size(),
            ));
        }
        Ok(Self::assemble(network, encoder, Mode::Intent(intents), seed))
    }

    /// Scalar-mode service over a single-output network
    pub fn scalar(network: Network, encoder: Encoder) -> Result<Self> {
        check_input(&network, &encoder)?;
        if network.output_size() != 1 {
            return Err(NetError::length("scalar output", 1, network.output_size()));
        }
        Ok(Self::assemble(network, encoder, Mode::Scalar, 0))
    }

    /// Build the encoder and a freshly initialised network for `intents`
    ///
    /// Uses `config.seed` for both weight initialisation and response
    /// selection, or a random seed when none is configured.
    pub fn from_config(config: &EngineConfig, intents: IntentTable) -> Result<Self> {
        config.validate()?;
        let intents = config.apply_to(intents);
        let encoder = config.build_encoder(&intents)?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let topology = config.topology(encoder.feature_len(), intents.output_size());
        let network = Network::seeded(&topology, seed)?;

        tracing::info!(
            topology = ?topology,
            parameters = network.parameter_count(),
            intents = intents.len(),
            seed,
            "engine assembled"
        );
        Self::new(network, encoder, intents, seed)
    }

    fn assemble(network: Network, encoder: Encoder, mode: Mode, seed: u64) -> Self {
        Self {
            network: Arc::new(RwLock::new(network)),
            encoder,
            mode,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn mode(&self) -> PredictMode {
        match self.mode {
            Mode::Intent(_) => PredictMode::Intent,
            Mode::Scalar => PredictMode::Scalar,
        }
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn intents(&self) -> Option<&IntentTable> {
        match &self.mode {
            Mode::Intent(table) => Some(table),
            Mode::Scalar => None,
        }
    }

    /// Shared handle to the network
    pub fn network(&self) -> Arc<RwLock<Network>> {
        Arc::clone(&self.network)
    }

    /// Whether a training run currently holds the network
    pub fn is_training(&self) -> bool {
        self.network.is_locked_exclusive()
    }

    /// Encode `text`, run the network and interpret the output
    ///
    /// # Errors
    ///
    /// - `TrainingInProgress` while a training run holds the network
    /// - `ShapeMismatch` if the network was swapped for one of another shape
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let input = self.encoder.encode(text);
        let network = self
            .network
            .try_read()
            .ok_or(NetError::TrainingInProgress)?;

        match &self.mode {
            Mode::Scalar => {
                let output = network.forward(&input)?;
                let value = output
                    .get(0)
                    .ok_or_else(|| NetError::length("scalar output", 1, output.len()))?;
                Ok(Prediction::Scalar(value))
            }
            Mode::Intent(table) => {
                let intent = table.classify(&input, &network)?;
                drop(network);
                tracing::debug!(intent = intent.map(|i| i.tag.as_str()), "classified input");
                let mut rng = self.rng.lock();
                Ok(Prediction::Response(table.respond(intent, &mut *rng)))
            }
        }
    }

    /// Chat-style wrapper around [`InferenceService::predict`]
    ///
    /// Never fails: errors are logged and replaced by [`ERROR_RESPONSE`].
    pub fn reply(&self, text: &str) -> String {
        match self.predict(text) {
            Ok(Prediction::Response(response)) => response,
            Ok(Prediction::Scalar(value)) => format!("{:.4}", value),
            Err(err) => {
                tracing::warn!(error = %err, "prediction failed");
                ERROR_RESPONSE.to_string()
            }
        }
    }

    /// Training pairs for the intent table, encoded with this service's encoder
    pub fn training_examples(&self) -> Result<Vec<TrainingExample>> {
        match &self.mode {
            Mode::Intent(table) => table.training_examples(&self.encoder),
            Mode::Scalar => Err(NetError::InvalidConfig(
                "scalar predictors have no intent table; pass examples explicitly".to_string(),
            )),
        }
    }

    /// Start a fresh run on the intent table's patterns
    ///
    /// Holds the write lock until the run completes or pauses.
    pub fn train<'t, F>(&self, trainer: &'t mut Trainer, is_paused: F) -> Result<&'t LossHistory>
    where
        F: FnMut() -> bool,
    {
        let examples = self.training_examples()?;
        self.train_on(trainer, &examples, is_paused)
    }

    /// Start a fresh run on explicit examples
    pub fn train_on<'t, F>(
        &self,
        trainer: &'t mut Trainer,
        examples: &[TrainingExample],
        is_paused: F,
    ) -> Result<&'t LossHistory>
    where
        F: FnMut() -> bool,
    {
        let mut network = self.network.write();
        trainer.run(&mut network, examples, is_paused)
    }

    /// Continue a paused run on explicit examples
    pub fn resume_on<'t, F>(
        &self,
        trainer: &'t mut Trainer,
        examples: &[TrainingExample],
        is_paused: F,
    ) -> Result<&'t LossHistory>
    where
        F: FnMut() -> bool,
    {
        let mut network = self.network.write();
        trainer.resume(&mut network, examples, is_paused)
    }
}

impl std::fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceService")
            .field("mode", &self.mode())
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}

fn check_input(network: &Network, encoder: &Encoder) -> Result<()> {
    if network.input_size() != encoder.feature_len() {
        return Err(NetError::length(
            "encoder features",
            network.input_size(),
            encoder.feature_len(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, IntentDecoding};
    use crate::tensor::Vector;
    use crate::train::{TrainerState, TrainingConfig};

    fn intents() -> IntentTable {
        IntentTable::new(vec![
            Intent::new("greeting", ["hi", "hello"], ["Hello!"]),
            Intent::new("goodbye", ["bye", "see you later"], ["Goodbye!"]),
            Intent::new("thanks", ["thanks", "thank you"], ["You're welcome."]),
        ])
        .unwrap()
    }

    fn config(decoding: IntentDecoding, epochs: usize) -> EngineConfig {
        EngineConfig {
            decoding: Some(decoding),
            ..EngineConfig::default()
        }
        .with_seed(42)
        .with_training(TrainingConfig::default().with_max_epochs(epochs))
    }

    #[test]
    fn test_new_rejects_mismatched_shapes() {
        let table = intents();
        let encoder = table.pattern_encoder().unwrap();

        let wrong_input = Network::seeded(&[3, 1], 1).unwrap();
        assert!(matches!(
            InferenceService::new(wrong_input, encoder.clone(), table.clone(), 0),
            Err(NetError::ShapeMismatch { .. })
        ));

        let wrong_output = Network::seeded(&[encoder.feature_len(), 3], 1).unwrap();
        assert!(matches!(
            InferenceService::new(wrong_output, encoder, table, 0),
            Err(NetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_trained_service_answers_known_patterns() {
        let cfg = config(IntentDecoding::Argmax, 500);
        let service = InferenceService::from_config(&cfg, intents()).unwrap();
        let mut trainer = Trainer::new(cfg.training.clone());
        service.train(&mut trainer, || false).unwrap();

        assert_eq!(trainer.state(), TrainerState::Completed);
        assert_eq!(service.reply("hello"), "Hello!");
        assert_eq!(service.reply("see you later"), "Goodbye!");
        assert_eq!(service.reply("thank you"), "You're welcome.");
    }

    #[test]
    fn test_scalar_index_decoding_learns_two_intents() {
        let table = IntentTable::new(vec![
            Intent::new("yes", ["yes", "sure"], ["ok"]),
            Intent::new("no", ["no", "nope"], ["fine"]),
        ])
        .unwrap();
        let cfg = config(IntentDecoding::ScalarIndex, 1000);
        let service = InferenceService::from_config(&cfg, table).unwrap();
        let mut trainer = Trainer::new(cfg.training.clone());
        service.train(&mut trainer, || false).unwrap();

        assert_eq!(service.reply("sure"), "ok");
        assert_eq!(service.reply("nope"), "fine");
    }

    #[test]
    fn test_predict_is_refused_while_training() {
        let cfg = config(IntentDecoding::Argmax, 10);
        let service = InferenceService::from_config(&cfg, intents()).unwrap();
        let mut trainer = Trainer::new(cfg.training.clone());

        let mut refused = false;
        let mut locked = false;
        service
            .train(&mut trainer, || {
                refused = matches!(service.predict("hi"), Err(NetError::TrainingInProgress));
                locked = service.is_training();
                true
            })
            .unwrap();

        assert!(refused);
        assert!(locked);
        assert_eq!(trainer.state(), TrainerState::Paused);
        assert!(!service.is_training());
        assert!(service.predict("hi").is_ok());
    }

    #[test]
    fn test_reply_masks_errors() {
        let cfg = config(IntentDecoding::Argmax, 10);
        let service = InferenceService::from_config(&cfg, intents()).unwrap();
        let handle = service.network();
        let _guard = handle.write();
        assert_eq!(service.reply("hello"), ERROR_RESPONSE);
    }

    #[test]
    fn test_concurrent_predictions() {
        let cfg = config(IntentDecoding::Argmax, 10);
        let service = InferenceService::from_config(&cfg, intents()).unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        assert!(matches!(service.predict("hi"), Ok(Prediction::Response(_))));
                    }
                });
            }
        });
    }

    #[test]
    fn test_scalar_predictor() {
        let encoder = Encoder::letter_frequency();
        let network = Network::seeded(&[encoder.feature_len(), 1], 3).unwrap();
        let service = InferenceService::scalar(network, encoder).unwrap();
        assert_eq!(service.mode(), PredictMode::Scalar);
        assert!(service.intents().is_none());
        assert!(matches!(service.training_examples(), Err(NetError::InvalidConfig(_))));

        let examples = vec![
            TrainingExample::new(service.encoder().encode("a"), Vector::from(vec![0.8])),
            TrainingExample::new(service.encoder().encode("z"), Vector::from(vec![-0.8])),
        ];
        let mut trainer = Trainer::new(TrainingConfig::default().with_max_epochs(300));
        service.train_on(&mut trainer, &examples, || false).unwrap();

        match service.predict("a").unwrap() {
            Prediction::Scalar(value) => assert!(value > 0.5, "got {}", value),
            other => panic!("expected scalar, got {:?}", other),
        }
        match service.predict("z").unwrap() {
            Prediction::Scalar(value) => assert!(value < -0.5, "got {}", value),
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_resume_after_pause() {
        let cfg = config(IntentDecoding::Argmax, 30);
        let service = InferenceService::from_config(&cfg, intents()).unwrap();
        let examples = service.training_examples().unwrap();
        let mut trainer = Trainer::new(cfg.training.clone());

        let mut epochs = 0;
        service
            .train_on(&mut trainer, &examples, || {
                epochs += 1;
                epochs == 5
            })
            .unwrap();
        assert_eq!(trainer.history().len(), 5);

        service.resume_on(&mut trainer, &examples, || false).unwrap();
        assert_eq!(trainer.history().len(), 30);
        assert_eq!(trainer.state(), TrainerState::Completed);
    }
}
