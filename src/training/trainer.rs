//! Training loop implementation for GAN and DCGAN
//!
//! Provides the main training loop with strict alternating updates: every
//! mini-batch runs one discriminator phase followed by one generator phase.
//! Each phase clears its own network's gradients first and must not change
//! the other network's parameters.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, nn::VarStore, Tensor};
use tracing::{debug, info, warn};

use super::history::{LossAccumulator, TrainingHistory};
use super::losses::{discriminator_loss, generator_loss};
use crate::data::DataLoader;
use crate::error::{GanError, Result};
use crate::model::Gan;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Total number of training epochs
    pub epochs: usize,
    /// Learning rate for generator
    pub gen_lr: f64,
    /// Learning rate for discriminator
    pub disc_lr: f64,
    /// Adam first-moment decay
    pub beta1: f64,
    /// Adam second-moment decay
    pub beta2: f64,
    /// Abort after this many consecutive non-finite steps; `None` never aborts
    pub max_consecutive_anomalies: Option<usize>,
    /// Epoch window for the mode collapse warning, 0 disables it
    pub collapse_window: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            gen_lr: 2e-4,
            disc_lr: 2e-4,
            beta1: 0.9,
            beta2: 0.999,
            max_consecutive_anomalies: Some(10),
            collapse_window: 10,
        }
    }
}

/// The two halves of a training step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discriminator,
    Generator,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Discriminator => write!(f, "discriminator"),
            Phase::Generator => write!(f, "generator"),
        }
    }
}

/// Result of one phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseOutcome {
    /// Loss value, possibly non-finite
    pub loss: f64,
    /// Whether the optimizer step was applied
    pub applied: bool,
}

/// Losses of one full training step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub discriminator: PhaseOutcome,
    pub generator: PhaseOutcome,
}

/// Per-epoch results handed to observers
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// 1-based epoch number
    pub epoch: usize,
    pub total_epochs: usize,
    pub d_loss: f64,
    pub g_loss: f64,
    pub seconds: f64,
    pub batches: usize,
    pub skipped_steps: usize,
}

/// Callback invoked after every epoch, used for sample emission
pub trait EpochObserver {
    fn on_epoch_end(&mut self, gan: &Gan, summary: &EpochSummary) -> Result<()>;
}

/// Observer that does nothing
#[derive(Debug, Default)]
pub struct NoopObserver;

impl EpochObserver for NoopObserver {
    fn on_epoch_end(&mut self, _gan: &Gan, _summary: &EpochSummary) -> Result<()> {
        Ok(())
    }
}

/// Counts non-finite phases and enforces the limit on consecutive bad steps.
///
/// A training step is bad when either of its phases is non-finite; only a
/// step where both phases applied resets the run.
#[derive(Debug, Clone)]
pub struct AnomalyGuard {
    limit: Option<usize>,
    consecutive: usize,
    total: usize,
}

impl AnomalyGuard {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            consecutive: 0,
            total: 0,
        }
    }

    /// Check one phase result; `false` means its optimizer step must be skipped
    pub fn check(&mut self, phase: Phase, loss: f64, grad_norm: f64) -> bool {
        if loss.is_finite() && grad_norm.is_finite() {
            return true;
        }

        self.total += 1;
        warn!(
            "Non-finite {} step skipped (loss {}, grad norm {})",
            phase, loss, grad_norm
        );
        false
    }

    /// Close a training step.
    ///
    /// Errors once `limit` bad steps have happened in a row.
    pub fn end_step(&mut self, clean: bool) -> Result<()> {
        if clean {
            self.consecutive = 0;
            return Ok(());
        }

        self.consecutive += 1;
        match self.limit {
            Some(limit) if self.consecutive >= limit => Err(GanError::NumericalInstability {
                consecutive: self.consecutive,
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// Current run of consecutive bad steps
    pub fn consecutive(&self) -> usize {
        self.consecutive
    }

    /// Skipped phases since creation
    pub fn total(&self) -> usize {
        self.total
    }
}

/// L2 norm over all gradients of the trainable variables in `vs`
pub fn grad_norm(vs: &VarStore) -> f64 {
    vs.trainable_variables()
        .iter()
        .map(|v| v.grad())
        .filter(|g| g.defined())
        .map(|g| g.norm().double_value(&[]).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// GAN Trainer
///
/// Owns both optimizers and the training history. The model is borrowed per
/// call so the caller keeps ownership of the weights.
pub struct Trainer {
    config: TrainingConfig,
    gen_opt: nn::Optimizer,
    disc_opt: nn::Optimizer,
    guard: AnomalyGuard,
    history: TrainingHistory,
}

impl Trainer {
    /// Create a new trainer with fresh Adam optimizers for `gan`
    pub fn new(gan: &Gan, config: TrainingConfig) -> Result<Self> {
        if config.epochs == 0 {
            return Err(GanError::Config("epochs must be positive".into()));
        }
        if config.gen_lr <= 0.0 || config.disc_lr <= 0.0 {
            return Err(GanError::Config("learning rates must be positive".into()));
        }

        let gen_opt = gan.generator_optimizer(config.gen_lr, config.beta1, config.beta2)?;
        let disc_opt = gan.discriminator_optimizer(config.disc_lr, config.beta1, config.beta2)?;

        Ok(Self {
            guard: AnomalyGuard::new(config.max_consecutive_anomalies),
            config,
            gen_opt,
            disc_opt,
            history: TrainingHistory::new(),
        })
    }

    /// Continue from a previous run's history; training resumes after its
    /// last recorded epoch
    pub fn with_history(mut self, history: TrainingHistory) -> Self {
        self.history = history;
        self
    }

    /// Discriminator phase on one real batch.
    ///
    /// D(real) is scored against ones, D(G(z)) against zeros, with G(z)
    /// detached so no gradient reaches the generator.
    pub fn discriminator_step(&mut self, gan: &mut Gan, real: &Tensor) -> Result<PhaseOutcome> {
        self.disc_opt.zero_grad();

        let batch_size = real.size()[0];
        let real_probs = gan.discriminator.forward_t(real, true);

        let noise = gan.sample_noise(batch_size);
        let fake = gan.generator.forward_t(&noise, true).detach();
        let fake_probs = gan.discriminator.forward_t(&fake, true);

        let loss = discriminator_loss(&real_probs, &fake_probs);
        loss.backward();

        let value = loss.double_value(&[]);
        let applied = self
            .guard
            .check(Phase::Discriminator, value, grad_norm(&gan.disc_vs));
        if applied {
            self.disc_opt.step();
        }

        Ok(PhaseOutcome {
            loss: value,
            applied,
        })
    }

    /// Generator phase with a fresh latent batch of `batch_size`.
    ///
    /// The discriminator's variables are frozen for the backward pass and
    /// unfrozen before returning.
    pub fn generator_step(&mut self, gan: &mut Gan, batch_size: i64) -> Result<PhaseOutcome> {
        self.gen_opt.zero_grad();

        gan.freeze_discriminator();
        let noise = gan.sample_noise(batch_size);
        let fake = gan.generator.forward_t(&noise, true);
        let fake_probs = gan.discriminator.forward_t(&fake, true);
        let loss = generator_loss(&fake_probs);
        loss.backward();
        gan.unfreeze_discriminator();

        let value = loss.double_value(&[]);
        let applied = self
            .guard
            .check(Phase::Generator, value, grad_norm(&gan.gen_vs));
        if applied {
            self.gen_opt.step();
        }

        Ok(PhaseOutcome {
            loss: value,
            applied,
        })
    }

    /// One full training step: discriminator phase, then generator phase.
    ///
    /// Fails with `NumericalInstability` once the configured number of
    /// consecutive steps had a skipped phase.
    pub fn train_step(&mut self, gan: &mut Gan, real: &Tensor) -> Result<StepLosses> {
        let discriminator = self.discriminator_step(gan, real)?;
        let generator = self.generator_step(gan, real.size()[0])?;
        self.guard
            .end_step(discriminator.applied && generator.applied)?;
        Ok(StepLosses {
            discriminator,
            generator,
        })
    }

    /// Run every batch of one epoch and record its mean losses
    pub fn train_epoch(&mut self, gan: &mut Gan, data_loader: &mut DataLoader) -> Result<EpochSummary> {
        let epoch = self.history.num_epochs() + 1;
        let num_batches = data_loader.num_batches();
        let (channels, image_size, device) = (gan.channels(), gan.image_size(), gan.device);

        let pb = ProgressBar::new(num_batches as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );

        let start = Instant::now();
        let mut d_losses = LossAccumulator::new();
        let mut g_losses = LossAccumulator::new();
        let mut skipped = 0;
        let mut batches = 0;

        for batch in data_loader.iter() {
            let real = batch.to_tensor(channels, image_size, device);
            let step = match self.train_step(gan, &real) {
                Ok(step) => step,
                Err(e) => {
                    pb.abandon_with_message("aborted");
                    return Err(e);
                }
            };

            d_losses.push(step.discriminator.loss);
            g_losses.push(step.generator.loss);
            skipped += usize::from(!step.discriminator.applied) + usize::from(!step.generator.applied);
            batches += 1;

            pb.set_message(format!(
                "D: {:.4}, G: {:.4}",
                step.discriminator.loss, step.generator.loss
            ));
            pb.inc(1);
        }

        pb.finish_and_clear();

        let seconds = start.elapsed().as_secs_f64();
        let summary = EpochSummary {
            epoch,
            total_epochs: self.config.epochs,
            d_loss: d_losses.mean(),
            g_loss: g_losses.mean(),
            seconds,
            batches,
            skipped_steps: skipped,
        };

        self.history
            .record_epoch(summary.d_loss, summary.g_loss, seconds, skipped);
        self.history.total_seconds += seconds;

        info!(
            "[{}/{}] - ptime: {:.2}, loss_d: {:.3}, loss_g: {:.3}",
            epoch, self.config.epochs, seconds, summary.d_loss, summary.g_loss
        );
        if skipped > 0 {
            warn!("Epoch {}: {} steps skipped as non-finite", epoch, skipped);
        }
        self.history.check_mode_collapse(self.config.collapse_window);

        Ok(summary)
    }

    /// Train until the history holds `config.epochs` epochs, calling
    /// `observer` after each one
    pub fn train(
        &mut self,
        gan: &mut Gan,
        data_loader: &mut DataLoader,
        observer: &mut dyn EpochObserver,
    ) -> Result<&TrainingHistory> {
        let first = self.history.num_epochs() + 1;
        info!(
            "Starting training at epoch {} of {}, {} batches per epoch",
            first,
            self.config.epochs,
            data_loader.num_batches()
        );

        while self.history.num_epochs() < self.config.epochs {
            let summary = self.train_epoch(gan, data_loader)?;
            observer.on_epoch_end(gan, &summary)?;
            debug!("Epoch {} observers done", summary.epoch);
        }

        info!(
            "Avg per epoch ptime: {:.2}, total {} epochs ptime: {:.2}",
            self.history.mean_epoch_seconds(),
            self.history.num_epochs(),
            self.history.total_seconds
        );
        if self.guard.total() > 0 {
            warn!("{} non-finite phases skipped in total", self.guard.total());
        }

        Ok(&self.history)
    }

    /// Get training history
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Take the history out of the trainer
    pub fn into_history(self) -> TrainingHistory {
        self.history
    }

    /// Get configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn guard(&self) -> &AnomalyGuard {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscriminatorConfig, GeneratorConfig};
    use tch::{Device, Kind};

    fn small_gan() -> Gan {
        Gan::new(
            GeneratorConfig {
                width: 8,
                ..Default::default()
            },
            DiscriminatorConfig {
                width: 8,
                ..Default::default()
            },
            Device::Cpu,
        )
        .unwrap()
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 100);
        assert_eq!(config.gen_lr, 2e-4);
        assert_eq!(config.disc_lr, 2e-4);
        assert_eq!(config.beta2, 0.999);
    }

    #[test]
    fn test_guard_counts_steps_not_phases() {
        let mut guard = AnomalyGuard::new(Some(3));

        // Bad discriminator phase, good generator phase: still a bad step
        assert!(!guard.check(Phase::Discriminator, f64::NAN, 1.0));
        assert!(guard.check(Phase::Generator, 0.7, 1.0));
        guard.end_step(false).unwrap();
        assert_eq!(guard.consecutive(), 1);

        assert!(!guard.check(Phase::Generator, 1.0, f64::INFINITY));
        guard.end_step(false).unwrap();
        assert_eq!(guard.consecutive(), 2);

        guard.end_step(true).unwrap();
        assert_eq!(guard.consecutive(), 0);
        assert_eq!(guard.total(), 2);
    }

    #[test]
    fn test_guard_aborts_at_limit() {
        let mut guard = AnomalyGuard::new(Some(2));
        assert!(guard.end_step(false).is_ok());
        let err = guard.end_step(false).unwrap_err();
        assert!(matches!(
            err,
            GanError::NumericalInstability {
                consecutive: 2,
                limit: 2
            }
        ));

        let mut lenient = AnomalyGuard::new(None);
        for _ in 0..50 {
            assert!(!lenient.check(Phase::Generator, f64::NAN, 0.0));
            assert!(lenient.end_step(false).is_ok());
        }
    }

    #[test]
    fn test_train_step_losses_non_negative() {
        let mut gan = small_gan();
        let mut trainer = Trainer::new(&gan, TrainingConfig::default()).unwrap();

        let real = Tensor::rand([8, 1, 28, 28], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let step = trainer.train_step(&mut gan, &real).unwrap();

        assert!(step.discriminator.applied && step.generator.applied);
        assert!(step.discriminator.loss >= 0.0);
        assert!(step.generator.loss >= 0.0);
    }

    #[test]
    fn test_discriminator_unfrozen_after_generator_step() {
        let mut gan = small_gan();
        let mut trainer = Trainer::new(&gan, TrainingConfig::default()).unwrap();
        let trainable = gan.disc_vs.trainable_variables().len();

        trainer.generator_step(&mut gan, 4).unwrap();

        assert!(gan
            .disc_vs
            .trainable_variables()
            .iter()
            .all(|v| v.requires_grad()));
        assert_eq!(gan.disc_vs.trainable_variables().len(), trainable);
    }

    #[test]
    fn test_rejects_zero_epochs() {
        let gan = small_gan();
        let config = TrainingConfig {
            epochs: 0,
            ..Default::default()
        };
        assert!(matches!(
            Trainer::new(&gan, config),
            Err(GanError::Config(_))
        ));
    }
}
