//! Checkpoint save/load utilities
//!
//! A checkpoint is a results directory holding both networks' weights, the
//! model configuration needed to rebuild them, and the training history.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::config::ModelConfig;
use crate::error::{GanError, Result};
use crate::model::Gan;
use crate::training::TrainingHistory;

pub const GENERATOR_FILE: &str = "generator_param.ot";
pub const DISCRIMINATOR_FILE: &str = "discriminator_param.ot";
pub const META_FILE: &str = "meta.json";
pub const HISTORY_JSON_FILE: &str = "train_hist.json";
pub const HISTORY_CSV_FILE: &str = "train_hist.csv";

/// Checkpoint metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Epochs completed
    pub epoch: usize,
    /// Generator loss of the last epoch, if finite
    pub gen_loss: Option<f64>,
    /// Discriminator loss of the last epoch, if finite
    pub disc_loss: Option<f64>,
    /// Timestamp of checkpoint
    pub timestamp: String,
    /// Architecture the weights belong to
    pub model: ModelConfig,
}

/// Paths of the files written by [`save_checkpoint`]
#[derive(Debug, Clone)]
pub struct CheckpointFiles {
    pub generator: PathBuf,
    pub discriminator: PathBuf,
    pub meta: PathBuf,
    pub history_json: PathBuf,
    pub history_csv: PathBuf,
}

impl CheckpointFiles {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            generator: dir.join(GENERATOR_FILE),
            discriminator: dir.join(DISCRIMINATOR_FILE),
            meta: dir.join(META_FILE),
            history_json: dir.join(HISTORY_JSON_FILE),
            history_csv: dir.join(HISTORY_CSV_FILE),
        }
    }
}

/// Save a complete checkpoint (weights + metadata + history)
///
/// # Arguments
///
/// * `gan` - Model to save
/// * `model` - Configuration the model was built from
/// * `history` - Training history so far
/// * `dir` - Directory to save into, created if missing
pub fn save_checkpoint(
    gan: &Gan,
    model: &ModelConfig,
    history: &TrainingHistory,
    dir: impl AsRef<Path>,
) -> Result<CheckpointFiles> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| GanError::artifact(dir, e))?;
    let files = CheckpointFiles::in_dir(dir);

    gan.save(&files.generator, &files.discriminator)?;

    let meta = CheckpointMeta {
        epoch: history.num_epochs(),
        gen_loss: history.latest_g_loss().filter(|l| l.is_finite()),
        disc_loss: history.latest_d_loss().filter(|l| l.is_finite()),
        timestamp: chrono::Utc::now().to_rfc3339(),
        model: model.clone(),
    };
    let meta_json = serde_json::to_string_pretty(&meta)?;
    std::fs::write(&files.meta, meta_json).map_err(|e| GanError::artifact(&files.meta, e))?;

    history
        .save_json(&files.history_json)
        .map_err(|e| GanError::artifact(&files.history_json, e))?;
    history
        .save_csv(&files.history_csv)
        .map_err(|e| GanError::artifact(&files.history_csv, e))?;

    tracing::info!("Saved checkpoint to {}", dir.display());
    Ok(files)
}

/// Load checkpoint metadata
pub fn load_checkpoint_meta(dir: impl AsRef<Path>) -> Result<CheckpointMeta> {
    let meta_path = dir.as_ref().join(META_FILE);
    let content = std::fs::read_to_string(&meta_path)
        .map_err(|e| GanError::Data(format!("cannot read {}: {}", meta_path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

/// Rebuild the model described by a checkpoint and load its weights
pub fn load_checkpoint(dir: impl AsRef<Path>, device: tch::Device) -> Result<(Gan, CheckpointMeta)> {
    let dir = dir.as_ref();
    let meta = load_checkpoint_meta(dir)?;
    let mut gan = Gan::new(
        meta.model.generator_config(),
        meta.model.discriminator_config(),
        device,
    )?;
    let files = CheckpointFiles::in_dir(dir);
    gan.load(&files.generator, &files.discriminator)?;

    tracing::info!("Loaded checkpoint from {} (epoch {})", dir.display(), meta.epoch);
    Ok((gan, meta))
}

/// Load weights from `dir` into an existing model and return the saved
/// history, for resuming a run.
///
/// Fails with a shape error if the checkpoint was made for another
/// architecture.
pub fn restore_checkpoint(gan: &mut Gan, model: &ModelConfig, dir: impl AsRef<Path>) -> Result<TrainingHistory> {
    let dir = dir.as_ref();
    let meta = load_checkpoint_meta(dir)?;
    if meta.model != *model {
        return Err(GanError::Shape(format!(
            "checkpoint in {} was saved for a different model ({:?})",
            dir.display(),
            meta.model
        )));
    }

    let files = CheckpointFiles::in_dir(dir);
    gan.load(&files.generator, &files.discriminator)?;

    let history = if files.history_json.exists() {
        TrainingHistory::load_json(&files.history_json)?
    } else {
        TrainingHistory::new()
    };

    tracing::info!(
        "Resuming from {} after epoch {}",
        dir.display(),
        history.num_epochs()
    );
    Ok(history)
}
