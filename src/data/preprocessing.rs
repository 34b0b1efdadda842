//! Image preprocessing for GAN training
//!
//! This module provides functions for:
//! - Normalizing raw 8-bit pixels to the [-1, 1] range of the generator's tanh
//! - Mapping generator output back to 8-bit pixels
//! - Resizing batches to the side length a network expects

use ndarray::Array3;
use tch::Tensor;

/// Mean and standard deviation applied after scaling pixels to [0, 1]
pub const PIXEL_MEAN: f32 = 0.5;
pub const PIXEL_STD: f32 = 0.5;

/// Normalize a single 8-bit pixel to [-1, 1]
///
/// Formula: x_norm = (x / 255 - mean) / std
pub fn normalize_pixel(value: u8) -> f32 {
    (value as f32 / 255.0 - PIXEL_MEAN) / PIXEL_STD
}

/// Map a normalized value back to an 8-bit pixel, clamping out-of-range input
pub fn denormalize_pixel(value: f32) -> u8 {
    let scaled = (value * PIXEL_STD + PIXEL_MEAN) * 255.0;
    scaled.round().clamp(0.0, 255.0) as u8
}

/// Normalize a flat buffer of `num_images` square images with side `side`
///
/// # Returns
///
/// Array of shape (num_images, side, side) with values in [-1, 1]
pub fn normalize_images(raw: &[u8], num_images: usize, side: usize) -> Option<Array3<f32>> {
    if raw.len() != num_images * side * side {
        return None;
    }
    let pixels: Vec<f32> = raw.iter().map(|&p| normalize_pixel(p)).collect();
    Array3::from_shape_vec((num_images, side, side), pixels).ok()
}

/// Bilinearly resize a (batch, C, H, W) tensor to (batch, C, side, side).
///
/// Returns the input unchanged when it already has the requested size.
pub fn resize_batch(images: &Tensor, side: i64) -> Tensor {
    let size = images.size();
    if size.len() == 4 && size[2] == side && size[3] == side {
        return images.shallow_clone();
    }
    images.upsample_bilinear2d([side, side], false, None::<f64>, None::<f64>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_normalize_pixel_range() {
        assert_eq!(normalize_pixel(0), -1.0);
        assert_eq!(normalize_pixel(255), 1.0);
        assert!(normalize_pixel(128).abs() < 0.01);
    }

    #[test]
    fn test_denormalize_pixel() {
        assert_eq!(denormalize_pixel(-1.0), 0);
        assert_eq!(denormalize_pixel(1.0), 255);
        assert_eq!(denormalize_pixel(3.0), 255);
        assert_eq!(denormalize_pixel(normalize_pixel(77)), 77);
    }

    #[test]
    fn test_normalize_images_shape() {
        let raw = vec![0u8; 2 * 4 * 4];
        let images = normalize_images(&raw, 2, 4).unwrap();
        assert_eq!(images.shape(), &[2, 4, 4]);
        assert!(images.iter().all(|&v| v == -1.0));

        assert!(normalize_images(&raw, 3, 4).is_none());
    }

    #[test]
    fn test_resize_batch() {
        let images = Tensor::rand([2, 1, 28, 28], (Kind::Float, Device::Cpu));
        let resized = resize_batch(&images, 64);
        assert_eq!(resized.size(), vec![2, 1, 64, 64]);

        let same = resize_batch(&images, 28);
        assert!(same.equal(&images));
    }
}
