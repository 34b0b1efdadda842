//! MNIST dataset structures
//!
//! Images are held in memory as a (num_images, 28, 28) array normalized to
//! [-1, 1]. Labels are kept alongside for bookkeeping only.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use mnist::MnistBuilder;
use ndarray::{s, Array3, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::preprocessing::normalize_images;
use crate::error::{GanError, Result};

/// Side length of an MNIST digit
pub const MNIST_SIDE: usize = 28;

const TRAIN_SIZE: u32 = 60_000;
const TEST_SIZE: u32 = 10_000;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

/// IDX files the loader expects, training set first
pub const MNIST_FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

/// In-memory greyscale image dataset
#[derive(Debug, Clone)]
pub struct MnistDataset {
    /// Images of shape (num_images, side, side), values in [-1, 1]
    images: Array3<f32>,
    /// Digit label per image
    labels: Vec<u8>,
}

impl MnistDataset {
    /// Create a dataset from normalized images and their labels
    pub fn new(images: Array3<f32>, labels: Vec<u8>) -> Result<Self> {
        if images.shape()[0] != labels.len() {
            return Err(GanError::Data(format!(
                "{} images but {} labels",
                images.shape()[0],
                labels.len()
            )));
        }
        if images.shape()[1] != images.shape()[2] {
            return Err(GanError::Data(format!(
                "images must be square, got {}x{}",
                images.shape()[1],
                images.shape()[2]
            )));
        }
        Ok(Self { images, labels })
    }

    /// Load the MNIST training split from IDX files under `data_dir`.
    ///
    /// Files are looked up in `data_dir` and then in `data_dir/MNIST/raw`.
    /// `limit` keeps only the first N training images.
    pub fn load(data_dir: impl AsRef<Path>, limit: Option<usize>) -> Result<Self> {
        let root = locate_files(data_dir.as_ref())?;
        for (name, (kind, count)) in MNIST_FILES.iter().zip(IDX_CONTENTS) {
            check_idx_file(&root.join(name), kind, count)?;
        }
        let base = format!("{}/", root.display());

        let mnist = MnistBuilder::new()
            .base_path(&base)
            .label_format_digit()
            .training_set_length(TRAIN_SIZE)
            .validation_set_length(0)
            .test_set_length(TEST_SIZE)
            .finalize();

        let mut num_images = mnist.trn_lbl.len();
        if let Some(limit) = limit {
            num_images = num_images.min(limit);
        }
        if num_images == 0 {
            return Err(GanError::Data(format!(
                "no training images in {}",
                root.display()
            )));
        }

        let images = mnist
            .trn_img
            .get(..num_images * MNIST_SIDE * MNIST_SIDE)
            .and_then(|pixels| normalize_images(pixels, num_images, MNIST_SIDE))
            .ok_or_else(|| {
                GanError::Data(format!(
                    "fewer than {} training images in {}",
                    num_images,
                    root.display()
                ))
            })?;
        let labels = mnist.trn_lbl[..num_images].to_vec();

        info!(
            "Loaded {} MNIST training images from {}",
            num_images,
            root.display()
        );

        Self::new(images, labels)
    }

    /// Random bright rectangles on a dark background.
    ///
    /// Stands in for MNIST in smoke runs and tests; identical seeds give
    /// identical datasets.
    pub fn synthetic(num_images: usize, seed: u64) -> Result<Self> {
        if num_images == 0 {
            return Err(GanError::Data("synthetic dataset must not be empty".into()));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut images = Array3::<f32>::from_elem((num_images, MNIST_SIDE, MNIST_SIDE), -1.0);
        let mut labels = Vec::with_capacity(num_images);

        for mut image in images.axis_iter_mut(Axis(0)) {
            let top = rng.gen_range(2..14);
            let left = rng.gen_range(2..14);
            let height = rng.gen_range(6..MNIST_SIDE - top - 1);
            let width = rng.gen_range(4..MNIST_SIDE - left - 1);
            let intensity: f32 = rng.gen_range(0.5..=1.0);
            image
                .slice_mut(s![top..top + height, left..left + width])
                .fill(intensity);
            labels.push(rng.gen_range(0..10));
        }

        Self::new(images, labels)
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Image side length
    pub fn side(&self) -> usize {
        self.images.shape()[1]
    }

    /// All images, (num_images, side, side)
    pub fn images(&self) -> &Array3<f32> {
        &self.images
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Single image view
    pub fn image(&self, index: usize) -> ArrayView2<'_, f32> {
        self.images.index_axis(Axis(0), index)
    }

    /// Split into images and labels
    pub fn into_parts(self) -> (Array3<f32>, Vec<u8>) {
        (self.images, self.labels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdxKind {
    Images,
    Labels,
}

/// Kind and item count of each entry of [`MNIST_FILES`]
const IDX_CONTENTS: [(IdxKind, u32); 4] = [
    (IdxKind::Images, TRAIN_SIZE),
    (IdxKind::Labels, TRAIN_SIZE),
    (IdxKind::Images, TEST_SIZE),
    (IdxKind::Labels, TEST_SIZE),
];

/// Check the header and size of one IDX file.
///
/// Image files carry magic 2051, the item count and 28x28 dimensions; label
/// files carry magic 2049 and the item count. The body must hold exactly
/// `count` items.
fn check_idx_file(path: &Path, kind: IdxKind, count: u32) -> Result<()> {
    let corrupt =
        |reason: String| GanError::Data(format!("{} is not a valid MNIST file: {}", path.display(), reason));

    let (magic, header_len, item_len) = match kind {
        IdxKind::Images => (IMAGE_MAGIC, 16, (MNIST_SIDE * MNIST_SIDE) as u64),
        IdxKind::Labels => (LABEL_MAGIC, 8, 1),
    };

    let mut file = File::open(path).map_err(|e| corrupt(e.to_string()))?;
    let mut header = [0u8; 16];
    file.read_exact(&mut header[..header_len])
        .map_err(|_| corrupt("header is truncated".to_string()))?;
    let field = |i: usize| {
        u32::from_be_bytes([header[4 * i], header[4 * i + 1], header[4 * i + 2], header[4 * i + 3]])
    };

    if field(0) != magic {
        return Err(corrupt(format!("magic number {}, expected {}", field(0), magic)));
    }
    if field(1) != count {
        return Err(corrupt(format!("{} items, expected {}", field(1), count)));
    }
    if kind == IdxKind::Images && (field(2) as usize != MNIST_SIDE || field(3) as usize != MNIST_SIDE) {
        return Err(corrupt(format!(
            "{}x{} images, expected {}x{}",
            field(2),
            field(3),
            MNIST_SIDE,
            MNIST_SIDE
        )));
    }

    let expected = header_len as u64 + count as u64 * item_len;
    let actual = file.metadata().map_err(|e| corrupt(e.to_string()))?.len();
    if actual != expected {
        return Err(corrupt(format!("{} bytes, expected {}", actual, expected)));
    }
    Ok(())
}

/// Find the directory holding all four IDX files
fn locate_files(data_dir: &Path) -> Result<PathBuf> {
    let candidates = [data_dir.to_path_buf(), data_dir.join("MNIST").join("raw")];
    candidates
        .into_iter()
        .find(|dir| MNIST_FILES.iter().all(|name| dir.join(name).is_file()))
        .ok_or_else(|| {
            GanError::Data(format!(
                "MNIST files ({}) not found in {} or {}/MNIST/raw",
                MNIST_FILES.join(", "),
                data_dir.display(),
                data_dir.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_dataset_shape_and_range() {
        let dataset = MnistDataset::synthetic(16, 7).unwrap();
        assert_eq!(dataset.len(), 16);
        assert_eq!(dataset.side(), MNIST_SIDE);
        assert_eq!(dataset.images().shape(), &[16, 28, 28]);
        assert!(dataset.images().iter().all(|&v| (-1.0..=1.0).contains(&v)));
        assert!(dataset.labels().iter().all(|&l| l < 10));
    }

    #[test]
    fn test_synthetic_dataset_is_seeded() {
        let a = MnistDataset::synthetic(8, 42).unwrap();
        let b = MnistDataset::synthetic(8, 42).unwrap();
        let c = MnistDataset::synthetic(8, 43).unwrap();
        assert_eq!(a.images(), b.images());
        assert_ne!(a.images(), c.images());
    }

    #[test]
    fn test_synthetic_images_have_foreground() {
        let dataset = MnistDataset::synthetic(4, 1).unwrap();
        for i in 0..dataset.len() {
            assert!(dataset.image(i).iter().any(|&v| v > 0.0));
        }
    }

    #[test]
    fn test_empty_synthetic_rejected() {
        assert!(matches!(
            MnistDataset::synthetic(0, 0),
            Err(GanError::Data(_))
        ));
    }

    #[test]
    fn test_missing_files_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MnistDataset::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, GanError::Data(_)));
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_label_count_must_match() {
        let images = Array3::<f32>::zeros((3, 4, 4));
        assert!(MnistDataset::new(images, vec![0, 1]).is_err());
    }

    fn write_idx(path: &Path, header: &[u32], body_len: usize) {
        let mut bytes: Vec<u8> = header.iter().flat_map(|v| v.to_be_bytes()).collect();
        bytes.resize(bytes.len() + body_len, 0);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_check_idx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images");

        write_idx(&path, &[IMAGE_MAGIC, 2, 28, 28], 2 * 784);
        assert!(check_idx_file(&path, IdxKind::Images, 2).is_ok());

        // Short body
        write_idx(&path, &[IMAGE_MAGIC, 2, 28, 28], 784);
        assert!(matches!(check_idx_file(&path, IdxKind::Images, 2), Err(GanError::Data(_))));

        // Wrong dimensions
        write_idx(&path, &[IMAGE_MAGIC, 2, 32, 32], 2 * 784);
        assert!(matches!(check_idx_file(&path, IdxKind::Images, 2), Err(GanError::Data(_))));

        // Label magic on an image file, and a header cut short
        write_idx(&path, &[LABEL_MAGIC, 2, 28, 28], 2 * 784);
        assert!(matches!(check_idx_file(&path, IdxKind::Images, 2), Err(GanError::Data(_))));
        write_idx(&path, &[IMAGE_MAGIC], 0);
        assert!(matches!(check_idx_file(&path, IdxKind::Images, 2), Err(GanError::Data(_))));

        let labels = dir.path().join("labels");
        write_idx(&labels, &[LABEL_MAGIC, 3], 3);
        assert!(check_idx_file(&labels, IdxKind::Labels, 3).is_ok());
        assert!(matches!(check_idx_file(&labels, IdxKind::Labels, 4), Err(GanError::Data(_))));
    }

    #[test]
    fn test_corrupt_files_are_data_error() {
        let dir = tempfile::tempdir().unwrap();
        for name in MNIST_FILES {
            std::fs::write(dir.path().join(name), b"not an idx file at all").unwrap();
        }

        let err = MnistDataset::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, GanError::Data(_)));
        assert!(err.is_setup_error());
    }
}
