//! Training module for GAN and DCGAN
//!
//! This module provides:
//! - Two-phase training loop with a non-finite step guard
//! - Loss functions (Binary Cross Entropy on probabilities)
//! - Training history

mod history;
mod losses;
mod trainer;

pub use history::{LossAccumulator, TrainingHistory};
pub use losses::{discriminator_loss, generator_loss};
pub use trainer::{
    grad_norm, AnomalyGuard, EpochObserver, EpochSummary, NoopObserver, Phase, PhaseOutcome,
    StepLosses, Trainer, TrainingConfig,
};
