//! Sample grid rendering
//!
//! Generated images are tiled into a square greyscale grid and written as PNG.
//! [`SampleEmitter`] does this after every epoch for a fresh and a fixed
//! latent batch.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tch::{Device, Kind, Tensor};
use tracing::debug;

use crate::data::denormalize_pixel;
use crate::error::{GanError, Result};
use crate::model::Gan;
use crate::training::{EpochObserver, EpochSummary};

/// White border between and around tiles, in pixels
pub const GUTTER: u32 = 2;

/// Height of the label strip added under captioned grids
pub const CAPTION_HEIGHT: u32 = 20;

pub const RANDOM_DIR: &str = "Random_results";
pub const FIXED_DIR: &str = "Fixed_results";

/// Tile the first `rows * rows` images of a (N, C, H, W) batch into a grid.
///
/// Values in [-1, 1] map to 0..=255; only the first channel is used. Missing
/// tiles stay white.
pub fn images_to_grid(images: &Tensor, rows: i64) -> Result<GrayImage> {
    let size = images.size();
    if size.len() != 4 || rows <= 0 {
        return Err(GanError::Shape(format!(
            "expected (N, C, H, W) images and positive rows, got {:?} with {} rows",
            size, rows
        )));
    }
    let (n, h, w) = (size[0].min(rows * rows), size[2], size[3]);

    let first_channel = images
        .narrow(0, 0, n)
        .select(1, 0)
        .to_device(Device::Cpu)
        .to_kind(Kind::Float)
        .contiguous()
        .view([-1]);
    let pixels = Vec::<f32>::try_from(&first_channel)?;

    let (rows, h, w) = (rows as u32, h as u32, w as u32);
    let width = rows * w + (rows + 1) * GUTTER;
    let height = rows * h + (rows + 1) * GUTTER;
    let mut grid = GrayImage::from_pixel(width, height, Luma([255]));

    for (k, tile) in pixels.chunks((h * w) as usize).enumerate() {
        let (row, col) = (k as u32 / rows, k as u32 % rows);
        let x0 = GUTTER + col * (w + GUTTER);
        let y0 = GUTTER + row * (h + GUTTER);
        for (i, &value) in tile.iter().enumerate() {
            let (y, x) = (i as u32 / w, i as u32 % w);
            grid.put_pixel(x0 + x, y0 + y, Luma([denormalize_pixel(value)]));
        }
    }

    Ok(grid)
}

/// Write a grid PNG to `path`, creating parent directories
pub fn save_grid(images: &Tensor, rows: i64, path: impl AsRef<Path>) -> Result<()> {
    write_png(&images_to_grid(images, rows)?, path.as_ref())
}

/// Add a white strip under `grid` with `label` centered in it
pub fn caption_grid(grid: &GrayImage, label: &str) -> Result<GrayImage> {
    let (width, height) = grid.dimensions();
    let full_height = height + CAPTION_HEIGHT;

    let mut canvas = RgbImage::from_pixel(width, full_height, Rgb([255, 255, 255]));
    for (x, y, pixel) in grid.enumerate_pixels() {
        canvas.put_pixel(x, y, Rgb([pixel[0]; 3]));
    }

    {
        let root = BitMapBackend::with_buffer(&mut *canvas, (width, full_height)).into_drawing_area();
        let style = ("sans-serif", 14.0)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let anchor = ((width / 2) as i32, (height + CAPTION_HEIGHT / 2) as i32);
        root.draw_text(label, &style, anchor)
            .map_err(|e| GanError::artifact(label, e))?;
        root.present().map_err(|e| GanError::artifact(label, e))?;
    }

    Ok(DynamicImage::ImageRgb8(canvas).to_luma8())
}

fn write_png(grid: &GrayImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| GanError::artifact(parent, e))?;
    }
    grid.save(path).map_err(|e| GanError::artifact(path, e))
}

/// Run the generator in eval mode on `noise` and save the resulting grid
pub fn render_grid(gan: &Gan, noise: &Tensor, rows: i64, path: impl AsRef<Path>) -> Result<()> {
    save_grid(&gan.generate_from_noise(noise), rows, path)
}

/// Like [`render_grid`], with `label` written under the grid
pub fn render_captioned_grid(
    gan: &Gan,
    noise: &Tensor,
    rows: i64,
    label: &str,
    path: impl AsRef<Path>,
) -> Result<()> {
    let grid = images_to_grid(&gan.generate_from_noise(noise), rows)?;
    write_png(&caption_grid(&grid, label)?, path.as_ref())
}

/// Writes `Random_results/<prefix>_<epoch>.png` and
/// `Fixed_results/<prefix>_<epoch>.png` after every epoch, each captioned
/// `Epoch <epoch>`
pub struct SampleEmitter {
    prefix: String,
    root: PathBuf,
    rows: i64,
    fixed_noise: Tensor,
    frames: Vec<PathBuf>,
}

impl SampleEmitter {
    /// Create an emitter writing under `root`; the fixed latent batch is
    /// drawn here, once per run
    pub fn new(gan: &Gan, root: impl Into<PathBuf>, prefix: impl Into<String>, rows: i64) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.into(),
            rows,
            fixed_noise: gan.sample_noise(rows * rows),
            frames: Vec::new(),
        }
    }

    /// Pick up fixed-noise frames of epochs `1..=epochs` already on disk
    pub fn with_existing_frames(mut self, epochs: usize) -> Self {
        self.frames = (1..=epochs)
            .map(|epoch| self.fixed_path(epoch))
            .filter(|p| p.is_file())
            .collect();
        self
    }

    pub fn random_path(&self, epoch: usize) -> PathBuf {
        self.root
            .join(RANDOM_DIR)
            .join(format!("{}_{}.png", self.prefix, epoch))
    }

    pub fn fixed_path(&self, epoch: usize) -> PathBuf {
        self.root
            .join(FIXED_DIR)
            .join(format!("{}_{}.png", self.prefix, epoch))
    }

    /// Latent batch reused for every fixed-noise grid
    pub fn fixed_noise(&self) -> &Tensor {
        &self.fixed_noise
    }

    /// Fixed-noise frames in epoch order
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }
}

impl EpochObserver for SampleEmitter {
    fn on_epoch_end(&mut self, gan: &Gan, summary: &EpochSummary) -> Result<()> {
        let label = format!("Epoch {}", summary.epoch);

        let random = gan.sample_noise(self.rows * self.rows);
        let random_path = self.random_path(summary.epoch);
        render_captioned_grid(gan, &random, self.rows, &label, &random_path)?;

        let fixed_path = self.fixed_path(summary.epoch);
        render_captioned_grid(gan, &self.fixed_noise, self.rows, &label, &fixed_path)?;
        self.frames.push(fixed_path);

        debug!("Saved epoch {} samples to {}", summary.epoch, random_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_grid_layout() {
        let images = Tensor::ones([4, 1, 3, 3], (Kind::Float, Device::Cpu));
        let grid = images_to_grid(&images, 2).unwrap();

        assert_eq!(grid.dimensions(), (2 * 3 + 3 * GUTTER, 2 * 3 + 3 * GUTTER));
        assert_eq!(grid.get_pixel(0, 0)[0], 255);
        assert_eq!(grid.get_pixel(GUTTER, GUTTER)[0], 255);

        let dark = Tensor::full([1, 1, 3, 3], -1.0, (Kind::Float, Device::Cpu));
        let grid = images_to_grid(&dark, 2).unwrap();
        assert_eq!(grid.get_pixel(GUTTER, GUTTER)[0], 0);
        // Second tile is missing and stays white
        assert_eq!(grid.get_pixel(GUTTER + 3 + GUTTER, GUTTER)[0], 255);
    }

    #[test]
    fn test_grid_rejects_flat_input() {
        let flat = Tensor::zeros([4, 784], (Kind::Float, Device::Cpu));
        assert!(matches!(images_to_grid(&flat, 2), Err(GanError::Shape(_))));
    }

    #[test]
    fn test_save_grid_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("grid.png");
        let images = Tensor::rand([9, 1, 28, 28], (Kind::Float, Device::Cpu));

        save_grid(&images, 3, &path).unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.width(), 3 * 28 + 4 * GUTTER);
    }

    #[test]
    fn test_caption_adds_label_strip() {
        let images = Tensor::full([4, 1, 28, 28], -1.0, (Kind::Float, Device::Cpu));
        let grid = images_to_grid(&images, 2).unwrap();
        let captioned = caption_grid(&grid, "Epoch 3").unwrap();

        assert_eq!(captioned.width(), grid.width());
        assert_eq!(captioned.height(), grid.height() + CAPTION_HEIGHT);
        // Grid pixels are carried over unchanged
        assert_eq!(captioned.get_pixel(GUTTER, GUTTER)[0], 0);
        assert_eq!(captioned.get_pixel(0, 0)[0], 255);

        let strip_has_text = (0..captioned.width())
            .flat_map(|x| (grid.height()..captioned.height()).map(move |y| (x, y)))
            .any(|(x, y)| captioned.get_pixel(x, y)[0] < 128);
        assert!(strip_has_text);
    }
}
