//! Training Logger
//!
//! Tracks the loss of a training run over time. Each epoch becomes one CSV
//! row and one `tracing` event, so a run can be followed live and plotted
//! afterwards.
//!
//! ## Example
//!
//! ```rust,no_run
//! use touchstone::TrainingLogger;
//!
//! let mut logger = TrainingLogger::new("loss_log.csv")?;
//! logger.log(1, 0.1, 0.25)?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ## CSV Format
//!
//! - `epoch`: 1-based epoch number
//! - `elapsed_seconds`: time since the logger was created
//! - `learning_rate`: step size used for the epoch
//! - `loss`: mean squared error averaged over the epoch's examples

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

const HEADER: &str = "epoch,elapsed_seconds,learning_rate,loss";

/// Per-epoch loss logger writing CSV rows
pub struct TrainingLogger {
    sink: Box<dyn Write + Send>,
    start_time: Instant,
    rows: usize,
}

impl TrainingLogger {
    /// Create a logger writing to a new CSV file at `log_path`
    ///
    /// The header row is written immediately.
    pub fn new<P: AsRef<Path>>(log_path: P) -> io::Result<Self> {
        let file = File::create(log_path)?;
        Self::from_writer(file)
    }

    /// Create a logger on top of any writer
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> io::Result<Self> {
        let mut sink: Box<dyn Write + Send> = Box::new(writer);
        writeln!(sink, "{}", HEADER)?;
        Ok(Self {
            sink,
            start_time: Instant::now(),
            rows: 0,
        })
    }

    /// Number of epoch rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Record one epoch
    ///
    /// The row is flushed right away so a crashed run keeps its history.
    pub fn log(&mut self, epoch: usize, learning_rate: f32, loss: f32) -> io::Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f32();

        writeln!(
            self.sink,
            "{},{:.3},{:.6},{:.6}",
            epoch, elapsed, learning_rate, loss
        )?;
        self.sink.flush()?;
        self.rows += 1;

        tracing::info!(epoch, elapsed_secs = elapsed, learning_rate, loss, "epoch complete");
        Ok(())
    }
}

impl std::fmt::Debug for TrainingLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingLogger")
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}
