//! Training history for monitoring GAN progress
//!
//! Append-only per-epoch record of mean losses and wall-clock time, written
//! out as JSON and CSV at the end of a run.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GanError, Result};

/// Losses and timings collected during training
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Mean discriminator loss per epoch
    #[serde(deserialize_with = "losses_from_json")]
    pub d_losses: Vec<f64>,
    /// Mean generator loss per epoch
    #[serde(deserialize_with = "losses_from_json")]
    pub g_losses: Vec<f64>,
    /// Wall-clock seconds per epoch
    pub per_epoch_seconds: Vec<f64>,
    /// Steps skipped because of non-finite values, per epoch
    #[serde(default)]
    pub skipped_steps: Vec<usize>,
    /// Total training time in seconds
    pub total_seconds: f64,
}

impl TrainingHistory {
    /// Create new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch results
    pub fn record_epoch(&mut self, d_loss: f64, g_loss: f64, seconds: f64, skipped: usize) {
        self.d_losses.push(d_loss);
        self.g_losses.push(g_loss);
        self.per_epoch_seconds.push(seconds);
        self.skipped_steps.push(skipped);
    }

    /// Get number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.d_losses.len()
    }

    pub fn latest_d_loss(&self) -> Option<f64> {
        self.d_losses.last().copied()
    }

    pub fn latest_g_loss(&self) -> Option<f64> {
        self.g_losses.last().copied()
    }

    /// Average seconds per epoch
    pub fn mean_epoch_seconds(&self) -> f64 {
        moving_average(&self.per_epoch_seconds, self.per_epoch_seconds.len())
    }

    /// Check if training appears to have collapsed
    ///
    /// Mode collapse indicators:
    /// - Discriminator loss very low (can easily distinguish)
    /// - Generator loss very high (can't fool discriminator)
    ///
    /// Only logs a warning; training continues either way.
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if window == 0 || self.num_epochs() < window {
            return false;
        }

        let d_ma = moving_average(&self.d_losses, window);
        let g_ma = moving_average(&self.g_losses, window);

        let collapsed = d_ma < 0.1 && g_ma > 5.0;
        if collapsed {
            warn!(
                "Possible mode collapse: mean D loss {:.4}, mean G loss {:.4} over last {} epochs",
                d_ma, g_ma, window
            );
        }
        collapsed
    }

    /// Save history as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load history from JSON; the per-epoch arrays must agree in length
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let history: Self = serde_json::from_reader(reader)?;

        let epochs = history.num_epochs();
        if history.g_losses.len() != epochs
            || history.per_epoch_seconds.len() != epochs
            || history.skipped_steps.len() > epochs
        {
            return Err(GanError::Data(format!(
                "{} has mismatched per-epoch arrays ({} D losses, {} G losses, {} timings, {} skip counts)",
                path.display(),
                epochs,
                history.g_losses.len(),
                history.per_epoch_seconds.len(),
                history.skipped_steps.len()
            )));
        }
        Ok(history)
    }

    /// Save per-epoch rows to CSV file
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["epoch", "d_loss", "g_loss", "seconds", "skipped_steps"])?;

        let value = |values: &[f64], i: usize| values.get(i).copied().unwrap_or(f64::NAN).to_string();
        for i in 0..self.num_epochs() {
            writer.write_record([
                (i + 1).to_string(),
                value(&self.d_losses, i),
                value(&self.g_losses, i),
                value(&self.per_epoch_seconds, i),
                self.skipped_steps.get(i).copied().unwrap_or(0).to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// JSON writes NaN as null; read it back as NaN
fn losses_from_json<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Running mean over the finite values of one epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct LossAccumulator {
    sum: f64,
    count: usize,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; non-finite values are ignored
    pub fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    /// Number of values counted
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the counted values, NaN when nothing was counted
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Calculate moving average of last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() || window == 0 {
        return 0.0;
    }

    let n = window.min(values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_history() {
        let mut history = TrainingHistory::new();

        history.record_epoch(1.5, 0.8, 2.0, 0);
        history.record_epoch(1.3, 0.75, 4.0, 1);

        assert_eq!(history.num_epochs(), 2);
        assert_eq!(history.latest_d_loss(), Some(1.3));
        assert_eq!(history.latest_g_loss(), Some(0.75));
        assert_eq!(history.mean_epoch_seconds(), 3.0);
    }

    #[test]
    fn test_mode_collapse_detection() {
        let mut history = TrainingHistory::new();
        for _ in 0..3 {
            history.record_epoch(0.01, 8.0, 1.0, 0);
        }
        assert!(history.check_mode_collapse(3));
        assert!(!history.check_mode_collapse(5));

        let mut healthy = TrainingHistory::new();
        healthy.record_epoch(1.2, 0.9, 1.0, 0);
        assert!(!healthy.check_mode_collapse(1));
    }

    #[test]
    fn test_loss_accumulator_skips_non_finite() {
        let mut acc = LossAccumulator::new();
        assert!(acc.mean().is_nan());

        acc.push(1.0);
        acc.push(f64::NAN);
        acc.push(3.0);
        acc.push(f64::INFINITY);

        assert_eq!(acc.count(), 2);
        assert_eq!(acc.mean(), 2.0);
    }

    #[test]
    fn test_history_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TrainingHistory::new();
        history.record_epoch(1.1, 0.7, 0.5, 0);
        history.total_seconds = 0.5;

        let json = dir.path().join("train_hist.json");
        history.save_json(&json).unwrap();
        assert_eq!(TrainingHistory::load_json(&json).unwrap(), history);

        let csv_path = dir.path().join("train_hist.csv");
        history.save_csv(&csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "epoch,d_loss,g_loss,seconds,skipped_steps");
        assert!(lines[1].starts_with("1,1.1,0.7"));
    }

    #[test]
    fn test_nan_epoch_survives_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TrainingHistory::new();
        history.record_epoch(f64::NAN, 0.9, 1.0, 12);

        let json = dir.path().join("train_hist.json");
        history.save_json(&json).unwrap();
        let loaded = TrainingHistory::load_json(&json).unwrap();

        assert!(loaded.d_losses[0].is_nan());
        assert_eq!(loaded.g_losses, vec![0.9]);
        assert_eq!(loaded.skipped_steps, vec![12]);
    }

    #[test]
    fn test_mismatched_json_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("train_hist.json");
        std::fs::write(
            &json,
            r#"{"d_losses":[1.0,0.9],"g_losses":[0.8,0.7],"per_epoch_seconds":[1.0],"total_seconds":1.0}"#,
        )
        .unwrap();

        assert!(matches!(
            TrainingHistory::load_json(&json),
            Err(GanError::Data(_))
        ));
    }

    #[test]
    fn test_csv_tolerates_short_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TrainingHistory::new();
        history.record_epoch(1.0, 0.8, 1.0, 0);
        history.d_losses.push(0.9);
        history.g_losses.push(0.7);

        let csv_path = dir.path().join("train_hist.csv");
        history.save_csv(&csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().last().unwrap().starts_with("2,0.9,0.7,NaN"));
    }
}
