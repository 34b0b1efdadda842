//! GAN and DCGAN for MNIST digit generation
//!
//! Main entry point providing CLI interface for:
//! - Training either network variant
//! - Generating samples from a saved model
//! - Writing a default configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use rust_gan_mnist::{
    cli::{self, TrainArgs},
    model::Architecture,
};

/// GAN and DCGAN training on MNIST
#[derive(Parser)]
#[command(name = "gan_mnist")]
#[command(version = "0.1.0")]
#[command(about = "Train generative adversarial networks on MNIST digits")]
struct Cli {
    /// Verbosity level
    #[arg(short, long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model
    Train {
        /// Network variant: linear or conv
        #[arg(short, long, default_value = "linear")]
        arch: Architecture,

        #[command(flatten)]
        args: TrainArgs,
    },

    /// Generate a sample grid from a trained model
    Generate {
        /// Results directory of a training run
        #[arg(short, long)]
        model: PathBuf,

        /// Output PNG path
        #[arg(short, long, default_value = "samples.png")]
        output: PathBuf,

        /// Grid rows (and columns)
        #[arg(short, long, default_value = "5")]
        grid: i64,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Device: cpu, cuda or cuda:N
        #[arg(long, default_value = "cpu")]
        device: String,
    },

    /// Initialize default configuration file
    Init {
        /// Network variant: linear or conv
        #[arg(short, long, default_value = "linear")]
        arch: Architecture,

        /// Output configuration file path (.json or .toml)
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(&cli.verbosity)?;

    match cli.command {
        Commands::Train { arch, args } => cli::train(arch, &args),
        Commands::Generate {
            model,
            output,
            grid,
            seed,
            device,
        } => cli::generate(&model, &output, grid, seed, &device),
        Commands::Init { arch, output } => cli::init(arch, &output),
    }
}
