//! Configuration management
//!
//! Provides unified configuration for the entire GAN pipeline, with presets
//! for the fully-connected and convolutional variants.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GanError, Result};
use crate::model::{Architecture, DiscriminatorConfig, GeneratorConfig, WeightInit};
use crate::training::TrainingConfig;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfigFile,
    /// Artifact configuration
    pub output: OutputConfig,
}

/// Data-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the MNIST IDX files
    pub data_dir: String,
    /// Batch size
    pub batch_size: usize,
    /// Reshuffle every epoch
    pub shuffle: bool,
    /// Drop the last incomplete batch
    pub drop_last: bool,
    /// Use only the first N training images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Train on N synthetic images instead of MNIST
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<usize>,
}

/// Model-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub architecture: Architecture,
    /// Latent dimension size
    pub latent_dim: i64,
    /// Width multiplier shared by both networks
    pub width: i64,
    /// Image channels
    pub channels: i64,
    /// Side length of generated and discriminated images
    pub image_size: i64,
    /// Dropout rate for the fully-connected discriminator
    pub dropout: f64,
    /// Weight initialization
    pub init: WeightInit,
}

impl ModelConfig {
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            architecture: self.architecture,
            latent_dim: self.latent_dim,
            width: self.width,
            channels: self.channels,
            image_size: self.image_size,
            init: self.init,
        }
    }

    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig {
            architecture: self.architecture,
            width: self.width,
            channels: self.channels,
            image_size: self.image_size,
            dropout: self.dropout,
            init: self.init,
        }
    }
}

/// Training-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfigFile {
    /// Number of epochs
    pub epochs: usize,
    /// Generator learning rate
    pub gen_lr: f64,
    /// Discriminator learning rate
    pub disc_lr: f64,
    /// Adam first-moment decay
    pub beta1: f64,
    /// Adam second-moment decay
    pub beta2: f64,
    /// Abort after this many consecutive non-finite steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_anomalies: Option<usize>,
    /// Epoch window for the mode collapse warning, 0 disables it
    pub collapse_window: usize,
    /// Seed for torch, shuffling and synthetic data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Device: "cpu", "cuda" or "cuda:N"
    pub device: String,
}

/// Artifact-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory of the run's results
    pub output_dir: String,
    /// Sample grids are `grid_rows x grid_rows`
    pub grid_rows: i64,
    /// Animation playback rate
    pub gif_fps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::linear()
    }
}

impl Config {
    /// Fully-connected GAN preset: 100 epochs, default Adam betas
    pub fn linear() -> Self {
        Self {
            data: DataConfig {
                data_dir: "data".to_string(),
                batch_size: 128,
                shuffle: true,
                drop_last: false,
                limit: None,
                synthetic: None,
            },
            model: ModelConfig {
                architecture: Architecture::Linear,
                latent_dim: 100,
                width: 256,
                channels: 1,
                image_size: 28,
                dropout: 0.3,
                init: WeightInit::default(),
            },
            training: TrainingConfigFile {
                epochs: 100,
                gen_lr: 2e-4,
                disc_lr: 2e-4,
                beta1: 0.9,
                beta2: 0.999,
                max_consecutive_anomalies: Some(10),
                collapse_window: 10,
                seed: None,
                device: "cpu".to_string(),
            },
            output: OutputConfig {
                output_dir: "MNIST_GAN_results".to_string(),
                grid_rows: 5,
                gif_fps: 5,
            },
        }
    }

    /// DCGAN preset: 20 epochs, beta1 0.5, 64x64 images
    pub fn convolutional() -> Self {
        let mut config = Self::linear();
        config.model.architecture = Architecture::Convolutional;
        config.model.width = 128;
        config.model.image_size = 64;
        config.training.epochs = 20;
        config.training.beta1 = 0.5;
        config.output.output_dir = "MNIST_DCGAN_results".to_string();
        config
    }

    /// Preset for `architecture`
    pub fn preset(architecture: Architecture) -> Self {
        match architecture {
            Architecture::Linear => Self::linear(),
            Architecture::Convolutional => Self::convolutional(),
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `.toml` or `.json` depending on the extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if is_toml(path) {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Save as `.toml` or `.json` depending on the extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if is_toml(path) {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        let requested = self.training.device.to_lowercase();
        match requested.as_str() {
            "cpu" => tch::Device::Cpu,
            other => {
                let index = other
                    .strip_prefix("cuda:")
                    .and_then(|i| i.parse::<usize>().ok())
                    .unwrap_or(0);
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(index)
                } else {
                    tracing::warn!("{} requested but CUDA is not available, falling back to CPU", other);
                    tch::Device::Cpu
                }
            }
        }
    }

    /// Results directory as a path
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.output_dir)
    }

    pub fn trainer_config(&self) -> TrainingConfig {
        let t = &self.training;
        TrainingConfig {
            epochs: t.epochs,
            gen_lr: t.gen_lr,
            disc_lr: t.disc_lr,
            beta1: t.beta1,
            beta2: t.beta2,
            max_consecutive_anomalies: t.max_consecutive_anomalies,
            collapse_window: t.collapse_window,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(GanError::Config(msg.to_string()));

        if self.data.batch_size == 0 {
            return invalid("batch size must be > 0");
        }
        if self.data.synthetic == Some(0) || self.data.limit == Some(0) {
            return invalid("dataset size must be > 0");
        }
        if self.model.latent_dim <= 0 || self.model.width <= 0 || self.model.channels <= 0 {
            return invalid("latent dimension, width and channels must be > 0");
        }
        if self.training.epochs == 0 {
            return invalid("number of epochs must be > 0");
        }
        if self.training.gen_lr <= 0.0 || self.training.disc_lr <= 0.0 {
            return invalid("learning rates must be > 0");
        }
        if !(0.0..1.0).contains(&self.training.beta1) || !(0.0..1.0).contains(&self.training.beta2) {
            return invalid("Adam betas must be in [0, 1)");
        }
        if self.training.max_consecutive_anomalies == Some(0) {
            return invalid("max_consecutive_anomalies must be > 0 when set");
        }
        if self.model.init.std <= 0.0 {
            return invalid("init std must be > 0");
        }
        if self.output.grid_rows <= 0 || self.output.gif_fps == 0 {
            return invalid("grid rows and gif fps must be > 0");
        }

        // Shape problems surface here rather than after the dataset is loaded
        self.model.generator_config().layers()?;
        self.model.discriminator_config().layers()?;
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    /// Applied to both networks
    pub lr: Option<f64>,
    pub latent_dim: Option<i64>,
    pub width: Option<i64>,
    pub image_size: Option<i64>,
    pub output_dir: Option<String>,
    pub data_dir: Option<String>,
    pub synthetic: Option<usize>,
    pub seed: Option<u64>,
    pub device: Option<String>,
    pub max_anomalies: Option<usize>,
}

impl ConfigOverrides {
    /// Write every set value into `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.data.batch_size = batch_size;
        }
        if let Some(lr) = self.lr {
            config.training.gen_lr = lr;
            config.training.disc_lr = lr;
        }
        if let Some(latent_dim) = self.latent_dim {
            config.model.latent_dim = latent_dim;
        }
        if let Some(width) = self.width {
            config.model.width = width;
        }
        if let Some(image_size) = self.image_size {
            config.model.image_size = image_size;
        }
        if let Some(dir) = &self.output_dir {
            config.output.output_dir = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data.data_dir = dir.clone();
        }
        if self.synthetic.is_some() {
            config.data.synthetic = self.synthetic;
        }
        if self.seed.is_some() {
            config.training.seed = self.seed;
        }
        if let Some(device) = &self.device {
            config.training.device = device.clone();
        }
        if self.max_anomalies.is_some() {
            config.training.max_consecutive_anomalies = self.max_anomalies;
        }
    }
}
