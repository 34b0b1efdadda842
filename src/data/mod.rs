//! Data module for loading and batching MNIST digits
//!
//! This module provides:
//! - MNIST IDX loading and a seeded synthetic stand-in dataset
//! - Pixel normalization and batch resizing
//! - DataLoader for shuffled mini-batches

mod loader;
mod mnist;
mod preprocessing;

pub use loader::{Batch, DataLoader};
pub use self::mnist::{MnistDataset, MNIST_FILES, MNIST_SIDE};
pub use preprocessing::{denormalize_pixel, normalize_images, normalize_pixel, resize_batch};
