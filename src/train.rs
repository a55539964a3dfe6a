//! Training Loop
//!
//! This module drives online training of a [`Network`] over a fixed set of
//! examples. One epoch is one pass over every example, calling
//! [`Network::train_step`] on each in order.
//!
//! ## State Machine
//!
//! ```text
//!            run()                 max epochs / target loss / time limit
//!   Idle ───────────▶ Running ─────────────────────────────────▶ Completed
//!    ▲                 │  ▲
//!    │ reset()  pause  │  │ resume()
//!    └──────────── Paused ◀┘
//! ```
//!
//! Epoch boundaries are the only places a run can stop or pause, so a
//! paused trainer always leaves the network fully updated for every example
//! of the last epoch and never part-way through one.
//!
//! ## Cooperative Scheduling
//!
//! [`Trainer::run`] and [`Trainer::resume`] loop until a stop condition or
//! the caller's `is_paused` flag fires. Hosts that need to interleave other
//! work can instead call [`Trainer::begin`] once and then [`Trainer::tick`]
//! once per scheduling slot; each tick runs exactly one epoch.
//!
//! ## Example
//!
//! ```rust
//! use touchstone::{Network, Trainer, TrainingConfig, TrainingExample, Vector};
//!
//! let mut net = Network::seeded(&[2, 4, 1], 42).unwrap();
//! let examples = vec![
//!     TrainingExample::new(Vector::from(vec![0.0, 0.0]), Vector::from(vec![0.0])),
//!     TrainingExample::new(Vector::from(vec![1.0, 1.0]), Vector::from(vec![1.0])),
//! ];
//!
//! let mut trainer = Trainer::new(TrainingConfig::default().with_max_epochs(50));
//! let history = trainer.run(&mut net, &examples, || false).unwrap();
//! assert_eq!(history.len(), 50);
//! ```

use crate::error::{NetError, Result};
use crate::network::Network;
use crate::tensor::Vector;
use crate::training_logger::TrainingLogger;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One `(input, target)` pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub input: Vector,
    pub target: Vector,
}

impl TrainingExample {
    pub fn new(input: Vector, target: Vector) -> Self {
        Self { input, target }
    }
}

/// Append-only sequence of per-epoch mean losses
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    losses: Vec<f32>,
}

impl LossHistory {
    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.losses
    }

    /// Loss of the most recent epoch
    pub fn last(&self) -> Option<f32> {
        self.losses.last().copied()
    }

    /// Lowest loss seen so far
    pub fn best(&self) -> Option<f32> {
        self.losses.iter().copied().reduce(f32::min)
    }

    fn push(&mut self, loss: f32) {
        self.losses.push(loss);
    }

    fn clear(&mut self) {
        self.losses.clear();
    }
}

/// Training configuration
///
/// Hyperparameters for an online training run.
///
/// # Common Configurations
///
/// - **Default**: learning rate 0.1, 1000 epochs
/// - **Quick**: short runs for tests and demos
/// - **Thorough**: smaller steps, more epochs, early stop on a loss target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// SGD step size
    pub learning_rate: f32,
    /// Upper bound on epochs per run
    pub max_epochs: usize,
    /// Stop early once an epoch's mean loss is at or below this value
    pub target_loss: Option<f32>,
    /// Wall-clock bound on active training time
    pub max_duration: Option<Duration>,
    /// Emit a progress event every N epochs (0 disables)
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_epochs: 1000,
            target_loss: None,
            max_duration: None,
            log_every: 100,
        }
    }
}

impl TrainingConfig {
    /// Short runs for quick experiments
    pub fn quick() -> Self {
        Self {
            learning_rate: 0.1,
            max_epochs: 200,
            log_every: 50,
            ..Self::default()
        }
    }

    /// Long runs with a gentler step and an early-stop target
    pub fn thorough() -> Self {
        Self {
            learning_rate: 0.05,
            max_epochs: 5000,
            target_loss: Some(1e-4),
            max_duration: Some(Duration::from_secs(60)),
            log_every: 500,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_target_loss(mut self, target_loss: f32) -> Self {
        self.target_loss = Some(target_loss);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Check that the values describe a run that can make progress
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NetError::InvalidConfig(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if self.max_epochs == 0 {
            return Err(NetError::InvalidConfig(
                "max_epochs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a trainer is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Why the last run left the `Running` state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    MaxEpochs,
    TargetLoss,
    TimeLimit,
    Paused,
    Diverged,
    /// Stopped by an error other than divergence, such as a failed loss-log write
    Failed,
}

/// Epoch-loop driver with pause/resume
#[derive(Debug)]
pub struct Trainer {
    config: TrainingConfig,
    state: TrainerState,
    history: LossHistory,
    stop_reason: Option<StopReason>,
    active_time: Duration,
    logger: Option<TrainingLogger>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            state: TrainerState::Idle,
            history: LossHistory::default(),
            stop_reason: None,
            active_time: Duration::ZERO,
            logger: None,
        }
    }

    /// Attach a CSV logger that receives every epoch's loss
    pub fn with_logger(mut self, logger: TrainingLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Epochs completed in the current run
    pub fn epochs_completed(&self) -> usize {
        self.history.len()
    }

    /// Start a fresh run and train until a stop condition or a pause
    ///
    /// `is_paused` is polled once after every epoch; when it returns `true`
    /// the trainer moves to `Paused` and returns.
    ///
    /// # Errors
    ///
    /// - `EmptyTrainingSet` if `examples` is empty (nothing is trained)
    /// - `ShapeMismatch` if any example does not fit the network
    /// - `NumericDivergence` if training blows up; the run stops there
    pub fn run<F>(
        &mut self,
        network: &mut Network,
        examples: &[TrainingExample],
        is_paused: F,
    ) -> Result<&LossHistory>
    where
        F: FnMut() -> bool,
    {
        self.begin(network, examples)?;
        self.drive(network, examples, is_paused)
    }

    /// Continue a paused run, appending to the same loss history
    pub fn resume<F>(
        &mut self,
        network: &mut Network,
        examples: &[TrainingExample],
        is_paused: F,
    ) -> Result<&LossHistory>
    where
        F: FnMut() -> bool,
    {
        if self.state != TrainerState::Paused {
            return Err(NetError::InvalidTransition(format!(
                "resume requires Paused, trainer is {:?}",
                self.state
            )));
        }
        validate_examples(network, examples)?;
        self.state = TrainerState::Running;
        self.stop_reason = None;
        tracing::info!(epoch = self.history.len(), "training resumed");
        self.drive(network, examples, is_paused)
    }

    /// Validate inputs and enter `Running` with an empty history
    ///
    /// Used directly by hosts that schedule epochs with [`Trainer::tick`].
    pub fn begin(&mut self, network: &Network, examples: &[TrainingExample]) -> Result<()> {
        if self.state == TrainerState::Running {
            return Err(NetError::InvalidTransition(
                "a run is already in progress".to_string(),
            ));
        }
        self.config.validate()?;
        validate_examples(network, examples)?;

        self.history.clear();
        self.stop_reason = None;
        self.active_time = Duration::ZERO;
        self.state = TrainerState::Running;
        tracing::info!(
            examples = examples.len(),
            max_epochs = self.config.max_epochs,
            learning_rate = self.config.learning_rate,
            "training started"
        );
        Ok(())
    }

    /// Run exactly one epoch, then apply the stop conditions
    ///
    /// # Returns
    ///
    /// The state after the epoch: `Running` or `Completed`
    ///
    /// # Errors
    ///
    /// - `EmptyTrainingSet` or `ShapeMismatch` before any weight is touched;
    ///   the trainer stays `Running`
    /// - `NumericDivergence` or a loss-log failure, which end the run
    pub fn tick(&mut self, network: &mut Network, examples: &[TrainingExample]) -> Result<TrainerState> {
        if self.state != TrainerState::Running {
            return Err(NetError::InvalidTransition(format!(
                "tick requires Running, trainer is {:?}",
                self.state
            )));
        }
        validate_examples(network, examples)?;

        let started = Instant::now();
        let epoch = self.history.len() + 1;
        let result = self.run_epoch(network, examples, epoch);
        self.active_time += started.elapsed();

        let loss = match result {
            Ok(loss) => loss,
            Err(err) => {
                tracing::warn!(epoch, error = %err, "training halted");
                let reason = match err {
                    NetError::NumericDivergence { .. } => StopReason::Diverged,
                    _ => StopReason::Failed,
                };
                self.finish(reason);
                return Err(err);
            }
        };
        self.history.push(loss);

        if let Some(logger) = self.logger.as_mut() {
            if let Err(err) = logger.log(epoch, self.config.learning_rate, loss) {
                tracing::warn!(epoch, error = %err, "loss log write failed");
                self.finish(StopReason::Failed);
                return Err(err.into());
            }
        } else if self.config.log_every > 0 && epoch % self.config.log_every == 0 {
            tracing::debug!(epoch, loss, "epoch complete");
        }

        if epoch >= self.config.max_epochs {
            self.finish(StopReason::MaxEpochs);
        } else if self.config.target_loss.is_some_and(|target| loss <= target) {
            self.finish(StopReason::TargetLoss);
        } else if self
            .config
            .max_duration
            .is_some_and(|limit| self.active_time >= limit)
        {
            self.finish(StopReason::TimeLimit);
        }
        Ok(self.state)
    }

    /// Move a running trainer to `Paused`
    pub fn pause(&mut self) -> Result<()> {
        if self.state != TrainerState::Running {
            return Err(NetError::InvalidTransition(format!(
                "pause requires Running, trainer is {:?}",
                self.state
            )));
        }
        self.state = TrainerState::Paused;
        self.stop_reason = Some(StopReason::Paused);
        tracing::info!(epoch = self.history.len(), "training paused");
        Ok(())
    }

    /// Discard the current run and return to `Idle`
    pub fn reset(&mut self) -> Result<()> {
        if self.state == TrainerState::Running {
            return Err(NetError::InvalidTransition(
                "cannot reset a running trainer".to_string(),
            ));
        }
        self.history.clear();
        self.stop_reason = None;
        self.active_time = Duration::ZERO;
        self.state = TrainerState::Idle;
        Ok(())
    }

    fn drive<F>(
        &mut self,
        network: &mut Network,
        examples: &[TrainingExample],
        mut is_paused: F,
    ) -> Result<&LossHistory>
    where
        F: FnMut() -> bool,
    {
        while self.tick(network, examples)? == TrainerState::Running {
            if is_paused() {
                self.pause()?;
                break;
            }
        }
        Ok(&self.history)
    }

    fn run_epoch(&self, network: &mut Network, examples: &[TrainingExample], epoch: usize) -> Result<f32> {
        let mut total = 0.0_f32;
        for (step, example) in examples.iter().enumerate() {
            let loss = network
                .train_step(&example.input, &example.target, self.config.learning_rate)
                .map_err(|err| match err {
                    NetError::NumericDivergence { .. } => NetError::NumericDivergence { epoch, step },
                    other => other,
                })?;
            total += loss;
        }
        Ok(total / examples.len() as f32)
    }

    fn finish(&mut self, reason: StopReason) {
        self.state = TrainerState::Completed;
        self.stop_reason = Some(reason);
        tracing::info!(
            epochs = self.history.len(),
            final_loss = self.history.last().unwrap_or(f32::NAN),
            reason = ?reason,
            "training finished"
        );
    }
}

/// Mean loss of `network` over `examples` without updating any weight
pub fn evaluate(network: &Network, examples: &[TrainingExample]) -> Result<f32> {
    if examples.is_empty() {
        return Err(NetError::EmptyTrainingSet);
    }
    let mut total = 0.0_f32;
    for example in examples {
        let output = network.forward(&example.input)?;
        total += example.target.sub(&output)?.mean_square();
    }
    Ok(total / examples.len() as f32)
}

fn validate_examples(network: &Network, examples: &[TrainingExample]) -> Result<()> {
    if examples.is_empty() {
        return Err(NetError::EmptyTrainingSet);
    }
    for example in examples {
        if example.input.len() != network.input_size() {
            return Err(NetError::length(
                "training example input",
                network.input_size(),
                example.input.len(),
            ));
        }
        if example.target.len() != network.output_size() {
            return Err(NetError::length(
                "training example target",
                network.output_size(),
                example.target.len(),
            ));
        }
    }
    Ok(())
}
