//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load utilities

mod checkpoint;
mod config;

pub use checkpoint::{
    load_checkpoint, load_checkpoint_meta, restore_checkpoint, save_checkpoint, CheckpointFiles,
    CheckpointMeta, DISCRIMINATOR_FILE, GENERATOR_FILE, HISTORY_CSV_FILE, HISTORY_JSON_FILE,
    META_FILE,
};
pub use config::{
    Config, ConfigOverrides, DataConfig, ModelConfig, OutputConfig, TrainingConfigFile,
};
