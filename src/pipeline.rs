//! End-to-end training run
//!
//! Builds the model and loader from a [`Config`], trains with per-epoch sample
//! emission, then writes the checkpoint, history, loss plot and animation to
//! the output directory.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::data::{DataLoader, MnistDataset};
use crate::error::{GanError, Result};
use crate::model::Gan;
use crate::output::{plot_losses, write_animation, SampleEmitter};
use crate::training::{Trainer, TrainingHistory};
use crate::utils::{restore_checkpoint, save_checkpoint, CheckpointFiles, Config};

pub const ANIMATION_FILE: &str = "generation_animation.gif";
pub const CONFIG_FILE: &str = "config.json";

/// Files produced by [`run`]
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub output_dir: PathBuf,
    pub checkpoint: CheckpointFiles,
    pub loss_plot: PathBuf,
    pub animation: PathBuf,
    /// Fixed-noise grids in epoch order
    pub fixed_samples: Vec<PathBuf>,
}

/// Load the dataset `config` asks for: synthetic when `data.synthetic` is set,
/// MNIST from `data.data_dir` otherwise
pub fn load_dataset(config: &Config) -> Result<MnistDataset> {
    match config.data.synthetic {
        Some(n) => {
            info!("Using {} synthetic images", n);
            MnistDataset::synthetic(n, config.training.seed.unwrap_or(0))
        }
        None => MnistDataset::load(&config.data.data_dir, config.data.limit),
    }
}

/// Train on `dataset` and write every run artifact.
///
/// With `resume`, weights and history are restored from that checkpoint
/// directory and training continues up to `training.epochs`.
pub fn run(
    config: &Config,
    dataset: MnistDataset,
    resume: Option<&Path>,
) -> Result<(TrainingHistory, RunArtifacts)> {
    config.validate()?;

    if let Some(seed) = config.training.seed {
        tch::manual_seed(seed as i64);
    }
    let shuffle_seed = config.training.seed.unwrap_or_else(rand::random);

    let device = config.get_device();
    info!("Using device: {:?}", device);

    let output_dir = config.output_dir();
    std::fs::create_dir_all(&output_dir).map_err(|e| GanError::artifact(&output_dir, e))?;
    config
        .save_json(output_dir.join(CONFIG_FILE))
        .map_err(|e| GanError::artifact(output_dir.join(CONFIG_FILE), e))?;

    let mut gan = Gan::new(
        config.model.generator_config(),
        config.model.discriminator_config(),
        device,
    )?;
    let mut loader = DataLoader::new(
        dataset,
        config.data.batch_size,
        config.data.shuffle,
        config.data.drop_last,
        shuffle_seed,
    )?;
    info!(
        "{} model, {} images, {} batches per epoch",
        config.model.architecture,
        loader.num_samples(),
        loader.num_batches()
    );

    let mut trainer = Trainer::new(&gan, config.trainer_config())?;
    let mut completed = 0;
    if let Some(dir) = resume {
        let history = restore_checkpoint(&mut gan, &config.model, dir)?;
        completed = history.num_epochs();
        trainer = trainer.with_history(history);
    }

    let prefix = config.model.architecture.file_prefix();
    let mut emitter = SampleEmitter::new(&gan, &output_dir, prefix, config.output.grid_rows)
        .with_existing_frames(completed);

    trainer.train(&mut gan, &mut loader, &mut emitter)?;
    let history = trainer.into_history();

    info!("Training finished, saving results to {}", output_dir.display());
    let checkpoint = save_checkpoint(&gan, &config.model, &history, &output_dir)?;

    let loss_plot = output_dir.join(format!("{}_train_hist.png", prefix));
    plot_losses(&history, &loss_plot)?;

    let animation = output_dir.join(ANIMATION_FILE);
    write_animation(emitter.frames(), &animation, config.output.gif_fps)?;

    let artifacts = RunArtifacts {
        output_dir,
        checkpoint,
        loss_plot,
        animation,
        fixed_samples: emitter.frames().to_vec(),
    };
    Ok((history, artifacts))
}
