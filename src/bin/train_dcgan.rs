//! Standalone binary for training the DCGAN preset (20 epochs by default)
//!
//! Usage:
//!   cargo run --release --bin train_dcgan -- --data-dir data

use anyhow::Result;
use clap::Parser;

use rust_gan_mnist::{
    cli::{self, TrainArgs},
    model::Architecture,
};

/// Train the DCGAN on MNIST
#[derive(Parser)]
#[command(name = "train_dcgan")]
#[command(about = "Train the DCGAN on MNIST")]
struct Args {
    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(flatten)]
    train: TrainArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cli::init_logging(&args.verbosity)?;

    cli::train(Architecture::Convolutional, &args.train)
}
