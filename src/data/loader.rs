//! DataLoader for batching and iterating over training images
//!
//! Provides batching for GAN training with support for:
//! - Seedable shuffling, reshuffled every epoch
//! - Drop last incomplete batch
//! - Conversion of a batch into a network-ready tensor

use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tch::{Device, Tensor};

use super::mnist::MnistDataset;
use super::preprocessing::resize_batch;
use crate::error::{GanError, Result};

/// One mini-batch of images and their labels
#[derive(Debug, Clone)]
pub struct Batch {
    /// Images of shape (batch_size, side, side), values in [-1, 1]
    pub images: Array3<f32>,
    pub labels: Vec<u8>,
}

impl Batch {
    /// Number of samples in the batch
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Build a (batch_size, channels, image_size, image_size) tensor on `device`.
    ///
    /// Images are bilinearly resized when `image_size` differs from the
    /// stored side, and the single grey channel is repeated for `channels > 1`.
    pub fn to_tensor(&self, channels: i64, image_size: i64, device: Device) -> Tensor {
        let (n, h, w) = self.images.dim();
        let pixels: Vec<f32> = self.images.iter().copied().collect();
        let images = Tensor::from_slice(&pixels)
            .view([n as i64, 1, h as i64, w as i64])
            .to_device(device);
        let images = resize_batch(&images, image_size);
        if channels > 1 {
            images.repeat([1, channels, 1, 1])
        } else {
            images
        }
    }
}

/// DataLoader for iterating over shuffled image batches
pub struct DataLoader {
    dataset: MnistDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    rng: StdRng,
    indices: Vec<usize>,
    current_idx: usize,
}

impl DataLoader {
    /// Create a new DataLoader
    ///
    /// # Arguments
    ///
    /// * `dataset` - Images to iterate over
    /// * `batch_size` - Number of images per batch
    /// * `shuffle` - Whether to shuffle data each epoch
    /// * `drop_last` - Whether to drop incomplete final batch
    /// * `seed` - Shuffle seed
    pub fn new(
        dataset: MnistDataset,
        batch_size: usize,
        shuffle: bool,
        drop_last: bool,
        seed: u64,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(GanError::Config("batch_size must be positive".into()));
        }
        if dataset.is_empty() || (drop_last && dataset.len() < batch_size) {
            return Err(GanError::Data(format!(
                "{} images cannot fill a batch of {}",
                dataset.len(),
                batch_size
            )));
        }

        let indices: Vec<usize> = (0..dataset.len()).collect();
        let mut loader = Self {
            dataset,
            batch_size,
            shuffle,
            drop_last,
            rng: StdRng::seed_from_u64(seed),
            indices,
            current_idx: 0,
        };

        if shuffle {
            loader.shuffle_indices();
        }

        Ok(loader)
    }

    /// Get the number of batches per epoch
    pub fn num_batches(&self) -> usize {
        let num_samples = self.num_samples();
        if self.drop_last {
            num_samples / self.batch_size
        } else {
            (num_samples + self.batch_size - 1) / self.batch_size
        }
    }

    /// Get total number of samples
    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Stored image side length
    pub fn image_side(&self) -> usize {
        self.dataset.side()
    }

    fn shuffle_indices(&mut self) {
        self.indices.shuffle(&mut self.rng);
    }

    /// Reset for new epoch
    pub fn reset(&mut self) {
        self.current_idx = 0;
        if self.shuffle {
            self.shuffle_indices();
        }
    }

    /// Get next batch
    ///
    /// Returns None when epoch is complete
    pub fn next_batch(&mut self) -> Option<Batch> {
        let num_samples = self.indices.len();
        let start = self.current_idx;

        if start >= num_samples {
            return None;
        }

        let end = (start + self.batch_size).min(num_samples);
        let actual_batch_size = end - start;

        // Skip incomplete batch if drop_last
        if self.drop_last && actual_batch_size < self.batch_size {
            return None;
        }

        let side = self.dataset.side();
        let mut images = Array3::<f32>::zeros((actual_batch_size, side, side));
        let mut labels = Vec::with_capacity(actual_batch_size);

        for (batch_idx, &data_idx) in self.indices[start..end].iter().enumerate() {
            images
                .index_axis_mut(Axis(0), batch_idx)
                .assign(&self.dataset.image(data_idx));
            labels.push(self.dataset.labels()[data_idx]);
        }

        self.current_idx = end;
        Some(Batch { images, labels })
    }

    /// Iterate over one epoch of batches, reshuffling first
    pub fn iter(&mut self) -> DataLoaderIter<'_> {
        self.reset();
        DataLoaderIter { loader: self }
    }
}

/// Iterator adapter for DataLoader
pub struct DataLoaderIter<'a> {
    loader: &'a mut DataLoader,
}

impl<'a> Iterator for DataLoaderIter<'a> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        self.loader.next_batch()
    }
}
