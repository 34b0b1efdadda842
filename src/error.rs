//! Error types for the GAN training library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, GanError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum GanError {
    /// Dataset missing, truncated or otherwise unusable
    #[error("Dataset error: {0}")]
    Data(String),

    /// Layer dimensions do not chain, or the architecture cannot produce the
    /// requested image size
    #[error("Shape mismatch: {0}")]
    Shape(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Too many consecutive steps produced non-finite losses or gradients
    #[error("Training diverged: {consecutive} consecutive non-finite steps (limit {limit})")]
    NumericalInstability { consecutive: usize, limit: usize },

    /// A run artifact could not be written
    #[error("Failed to write {path}: {reason}")]
    Artifact { path: String, reason: String },

    /// Error raised by libtorch
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GanError {
    /// Build an artifact error for `path`
    pub fn artifact(path: impl AsRef<std::path::Path>, reason: impl std::fmt::Display) -> Self {
        GanError::Artifact {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error happened before any training step ran
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            GanError::Data(_) | GanError::Shape(_) | GanError::Config(_)
        )
    }
}
