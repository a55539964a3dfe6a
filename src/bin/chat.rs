//! Train a Touchstone intent classifier and chat with it
//!
//! Trains a fresh network on an intents file, prints the final loss, then
//! answers each line read from stdin until EOF or `quit`.
//!
//! ## Usage
//!
//! ```bash
//! # Built-in intents
//! cargo run --release --bin touchstone-chat
//!
//! # Custom intents and engine configuration
//! cargo run --release --bin touchstone-chat -- \
//!     --intents my_intents.json --config engine.json --epochs 2000
//!
//! # Reproducible run with a CSV loss log
//! cargo run --release --bin touchstone-chat -- --seed 42 --loss-log loss.csv
//! ```
//!
//! Set `RUST_LOG=touchstone=debug` for per-prediction logging.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use touchstone::{EngineConfig, InferenceService, IntentTable, Trainer, TrainingLogger};

const BUILTIN_INTENTS: &str = include_str!("../../data/intents.json");

#[derive(Parser)]
#[command(
    name = "touchstone-chat",
    about = "Train a tiny intent classifier and chat with it"
)]
struct Args {
    /// Intents JSON file (defaults to the built-in set)
    #[arg(long)]
    intents: Option<PathBuf>,

    /// Engine configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum training epochs (overrides the configuration)
    #[arg(long)]
    epochs: Option<usize>,

    /// Learning rate (overrides the configuration)
    #[arg(long)]
    lr: Option<f32>,

    /// Seed for weight initialisation and response selection
    #[arg(long)]
    seed: Option<u64>,

    /// Write per-epoch loss to this CSV file
    #[arg(long)]
    loss_log: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("touchstone=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let intents = match &args.intents {
        Some(path) => IntentTable::load(path)?,
        None => IntentTable::from_json_str(BUILTIN_INTENTS)?,
    };

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(epochs) = args.epochs {
        config.training = config.training.with_max_epochs(epochs);
    }
    if let Some(lr) = args.lr {
        config.training = config.training.with_learning_rate(lr);
    }

    let service = InferenceService::from_config(&config, intents)?;

    let mut trainer = Trainer::new(config.training.clone());
    if let Some(path) = &args.loss_log {
        trainer = trainer.with_logger(TrainingLogger::new(path)?);
    }

    println!("Training on {} intents...", service.intents().map_or(0, |t| t.len()));
    let history = service.train(&mut trainer, || false)?;
    println!(
        "Done: {} epochs, final loss {:.6}, best {:.6}",
        history.len(),
        history.last().unwrap_or(f32::NAN),
        history.best().unwrap_or(f32::NAN)
    );
    if let Some(reason) = trainer.stop_reason() {
        println!("Stopped: {:?}", reason);
    }

    println!("\nType a message (or 'quit' to exit).");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let text = line.trim();
        if text.eq_ignore_ascii_case("quit") {
            break;
        }
        if !text.is_empty() {
            println!("{}", service.reply(text));
        }
        print!("> ");
        stdout.flush()?;
    }

    Ok(())
}
