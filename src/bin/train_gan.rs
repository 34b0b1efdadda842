//! Standalone binary for training the fully-connected GAN preset (100 epochs by default)
//!
//! Usage:
//!   cargo run --release --bin train_gan -- --data-dir data

use anyhow::Result;
use clap::Parser;

use rust_gan_mnist::{
    cli::{self, TrainArgs},
    model::Architecture,
};

/// Train the fully-connected GAN on MNIST
#[derive(Parser)]
#[command(name = "train_gan")]
#[command(about = "Train the fully-connected GAN on MNIST")]
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

    cli::train(Architecture::Linear, &args.train)
}
