//! # GAN and DCGAN for MNIST
//!
//! This crate trains generative adversarial networks on MNIST digits, in a
//! fully-connected variant and a deep convolutional (DCGAN) variant.
//!
//! ## Modules
//!
//! - `data`: MNIST loading, preprocessing and batching
//! - `model`: Generator and Discriminator for both variants
//! - `training`: Two-phase training loop, losses and history
//! - `output`: Sample grids, loss plot and animation
//! - `utils`: Configuration and checkpoints
//! - `pipeline`: End-to-end training run

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod training;
pub mod utils;

pub use data::{DataLoader, MnistDataset};
pub use error::{GanError, Result};
pub use model::{Architecture, Discriminator, Gan, Generator};
pub use training::{Trainer, TrainingConfig, TrainingHistory};
pub use utils::{load_checkpoint, save_checkpoint, Config};
