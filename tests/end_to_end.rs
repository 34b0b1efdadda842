//! End-to-end training runs on synthetic data

use std::path::Path;

use rust_gan_mnist::data::{DataLoader, MnistDataset};
use rust_gan_mnist::model::Architecture;
use rust_gan_mnist::pipeline;
use rust_gan_mnist::training::TrainingHistory;
use rust_gan_mnist::utils::{load_checkpoint_meta, Config};

fn small_config(architecture: Architecture, output_dir: &Path) -> Config {
    let mut config = Config::preset(architecture);
    config.data.batch_size = 32;
    config.data.synthetic = Some(256);
    config.model.latent_dim = 16;
    config.model.width = 8;
    config.training.epochs = 2;
    config.training.seed = Some(7);
    config.output.grid_rows = 3;
    config.output.output_dir = output_dir.to_string_lossy().into_owned();
    config
}

fn assert_finite_history(history: &TrainingHistory, epochs: usize) {
    assert_eq!(history.d_losses.len(), epochs);
    assert_eq!(history.g_losses.len(), epochs);
    assert_eq!(history.per_epoch_seconds.len(), epochs);
    assert!(history.d_losses.iter().all(|l| l.is_finite() && *l >= 0.0));
    assert!(history.g_losses.iter().all(|l| l.is_finite() && *l >= 0.0));
    assert!(history.total_seconds > 0.0);
}

/// Test a two-epoch fully-connected run and every artifact it leaves behind
#[test]
fn test_two_epoch_linear_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("MNIST_GAN_results");
    let config = small_config(Architecture::Linear, &out);

    let dataset = pipeline::load_dataset(&config).unwrap();
    assert_eq!(dataset.len(), 256);
    let loader = DataLoader::new(dataset.clone(), 32, true, false, 0).unwrap();
    assert_eq!(loader.num_batches(), 8);

    let (history, artifacts) = pipeline::run(&config, dataset, None).unwrap();

    assert_finite_history(&history, 2);

    assert!(artifacts.checkpoint.generator.is_file());
    assert!(artifacts.checkpoint.discriminator.is_file());
    assert!(artifacts.checkpoint.history_json.is_file());
    assert!(artifacts.checkpoint.history_csv.is_file());
    assert!(artifacts.loss_plot.ends_with("MNIST_GAN_train_hist.png"));
    assert!(artifacts.loss_plot.is_file());
    assert!(artifacts.animation.is_file());

    for epoch in 1..=2 {
        assert!(out
            .join("Random_results")
            .join(format!("MNIST_GAN_{}.png", epoch))
            .is_file());
        assert!(out
            .join("Fixed_results")
            .join(format!("MNIST_GAN_{}.png", epoch))
            .is_file());
    }
    assert_eq!(artifacts.fixed_samples.len(), 2);

    let meta = load_checkpoint_meta(&out).unwrap();
    assert_eq!(meta.epoch, 2);
    assert_eq!(meta.model, config.model);
    let saved = TrainingHistory::load_json(&artifacts.checkpoint.history_json).unwrap();
    assert_eq!(saved.num_epochs(), 2);
    assert!((saved.d_losses[1] - history.d_losses[1]).abs() < 1e-9);
}

/// Test resuming a finished run for one more epoch
#[test]
fn test_resume_continues_history() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results");
    let mut config = small_config(Architecture::Linear, &out);
    config.training.epochs = 1;

    let dataset = pipeline::load_dataset(&config).unwrap();
    let (first, _) = pipeline::run(&config, dataset.clone(), None).unwrap();
    assert_eq!(first.num_epochs(), 1);

    config.training.epochs = 2;
    let (resumed, artifacts) = pipeline::run(&config, dataset, Some(&out)).unwrap();

    assert_finite_history(&resumed, 2);
    assert!((resumed.d_losses[0] - first.d_losses[0]).abs() < 1e-9);
    assert_eq!(artifacts.fixed_samples.len(), 2);
    assert!(artifacts.fixed_samples[1].ends_with("MNIST_GAN_2.png"));
}

/// Test a short convolutional run with resized inputs
#[test]
fn test_small_convolutional_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("MNIST_DCGAN_results");
    let mut config = small_config(Architecture::Convolutional, &out);
    config.model.image_size = 16;
    config.model.width = 4;
    config.data.synthetic = Some(64);
    config.data.batch_size = 16;
    config.training.epochs = 1;

    let dataset = pipeline::load_dataset(&config).unwrap();
    let (history, artifacts) = pipeline::run(&config, dataset, None).unwrap();

    assert_finite_history(&history, 1);
    assert!(out
        .join("Fixed_results")
        .join("MNIST_DCGAN_1.png")
        .is_file());
    assert!(artifacts.loss_plot.ends_with("MNIST_DCGAN_train_hist.png"));

    let grid = image::open(&artifacts.fixed_samples[0]).unwrap().to_luma8();
    assert_eq!(grid.width(), 3 * 16 + 4 * 2);

    let samples = dir.path().join("samples.png");
    rust_gan_mnist::cli::generate(&out, &samples, 2, Some(1), "cpu").unwrap();
    assert!(samples.is_file());
}

/// Test that a missing MNIST directory fails before training
#[test]
fn test_missing_dataset_fails_early() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::linear();
    config.data.data_dir = dir.path().join("nowhere").to_string_lossy().into_owned();

    let err = pipeline::load_dataset(&config).unwrap_err();
    assert!(err.is_setup_error());
}

/// Test that an invalid model is rejected before anything is written
#[test]
fn test_invalid_model_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("bad");
    let mut config = small_config(Architecture::Convolutional, &out);
    config.model.image_size = 28;

    let dataset = MnistDataset::synthetic(32, 0).unwrap();
    assert!(pipeline::run(&config, dataset, None).is_err());
    assert!(!out.exists());
}
