//! Command-line arguments and commands shared by the binaries

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::model::Architecture;
use crate::output::render_grid;
use crate::pipeline;
use crate::utils::{load_checkpoint, Config, ConfigOverrides};

/// Options of a training run; unset values come from the config file or the
/// architecture preset
#[derive(Args, Debug, Clone, Default)]
pub struct TrainArgs {
    /// Configuration file (.json or .toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of training epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Learning rate for both networks
    #[arg(long)]
    pub lr: Option<f64>,

    /// Latent dimension size
    #[arg(long)]
    pub latent_dim: Option<i64>,

    /// Width multiplier (hidden units or base filters)
    #[arg(long)]
    pub width: Option<i64>,

    /// Image side length
    #[arg(long)]
    pub image_size: Option<i64>,

    /// Results directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Directory with the MNIST IDX files
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Train on N synthetic images instead of MNIST
    #[arg(long, value_name = "N")]
    pub synthetic: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Device: cpu, cuda or cuda:N
    #[arg(long)]
    pub device: Option<String>,

    /// Abort after N consecutive non-finite steps
    #[arg(long, value_name = "N")]
    pub max_anomalies: Option<usize>,

    /// Resume from a results directory
    #[arg(long, value_name = "DIR")]
    pub resume: Option<PathBuf>,
}

impl TrainArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            epochs: self.epochs,
            batch_size: self.batch_size,
            lr: self.lr,
            latent_dim: self.latent_dim,
            width: self.width,
            image_size: self.image_size,
            output_dir: self.output_dir.clone(),
            data_dir: self.data_dir.clone(),
            synthetic: self.synthetic,
            seed: self.seed,
            device: self.device.clone(),
            max_anomalies: self.max_anomalies,
        }
    }

    /// Config file if given, otherwise the preset for `architecture`, with
    /// command-line values applied on top.
    ///
    /// A config file written for another architecture is rejected.
    pub fn resolve_config(&self, architecture: Architecture) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let config = Config::load(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                if config.model.architecture != architecture {
                    anyhow::bail!(
                        "{} describes a {} model but {} training was requested",
                        path.display(),
                        config.model.architecture,
                        architecture
                    );
                }
                config
            }
            None => Config::preset(architecture),
        };
        self.overrides().apply(&mut config);
        Ok(config)
    }
}

/// Install the global tracing subscriber
pub fn init_logging(verbosity: &str) -> Result<()> {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Train with the given arguments
pub fn train(architecture: Architecture, args: &TrainArgs) -> Result<()> {
    let config = args.resolve_config(architecture)?;
    config.validate()?;

    let dataset = pipeline::load_dataset(&config)?;
    let (history, artifacts) = pipeline::run(&config, dataset, args.resume.as_deref())?;

    info!(
        "Training complete after {} epochs. Final D loss: {:.4}, G loss: {:.4}",
        history.num_epochs(),
        history.latest_d_loss().unwrap_or(f64::NAN),
        history.latest_g_loss().unwrap_or(f64::NAN)
    );
    info!("Results written to {}", artifacts.output_dir.display());
    Ok(())
}

/// Render a sample grid from a saved model
pub fn generate(model_dir: &Path, output: &Path, rows: i64, seed: Option<u64>, device: &str) -> Result<()> {
    if rows <= 0 {
        anyhow::bail!("grid rows must be > 0");
    }
    if let Some(seed) = seed {
        tch::manual_seed(seed as i64);
    }

    let mut device_config = Config::default();
    device_config.training.device = device.to_string();

    let (gan, meta) = load_checkpoint(model_dir, device_config.get_device())
        .with_context(|| format!("failed to load model from {}", model_dir.display()))?;
    info!(
        "Loaded {} model trained for {} epochs",
        meta.model.architecture, meta.epoch
    );

    let noise = gan.sample_noise(rows * rows);
    render_grid(&gan, &noise, rows, output)?;
    info!("Saved {}x{} samples to {}", rows, rows, output.display());
    Ok(())
}

/// Write the preset configuration for `architecture` to `output`
pub fn init(architecture: Architecture, output: &Path) -> Result<()> {
    Config::preset(architecture).save(output)?;
    info!("Created default {} configuration at {}", architecture, output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_applies_overrides() {
        let args = TrainArgs {
            epochs: Some(3),
            image_size: Some(32),
            ..Default::default()
        };
        let config = args.resolve_config(Architecture::Convolutional).unwrap();
        assert_eq!(config.model.architecture, Architecture::Convolutional);
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.model.image_size, 32);
    }

    #[test]
    fn test_resolve_config_rejects_other_architecture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linear.json");
        Config::linear().save(&path).unwrap();

        let args = TrainArgs {
            config: Some(path),
            ..Default::default()
        };
        assert!(args.resolve_config(Architecture::Convolutional).is_err());

        let config = args.resolve_config(Architecture::Linear).unwrap();
        assert_eq!(config, Config::linear());
    }
}
