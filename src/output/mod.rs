//! Output module for run artifacts
//!
//! This module provides:
//! - Sample grid PNGs and the per-epoch sample emitter
//! - Loss curve plot
//! - GIF animation of the fixed-noise samples

mod animation;
mod plot;
mod samples;

pub use animation::write_animation;
pub use plot::{plot_losses, PLOT_SIZE};
pub use samples::{
    caption_grid, images_to_grid, render_captioned_grid, render_grid, save_grid, SampleEmitter,
    CAPTION_HEIGHT, FIXED_DIR, GUTTER, RANDOM_DIR,
};
