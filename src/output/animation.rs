//! GIF assembly from per-epoch sample grids

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};

use crate::error::{GanError, Result};

/// Write `frames` in order as a looping GIF at `fps` frames per second
pub fn write_animation(frames: &[PathBuf], path: impl AsRef<Path>, fps: u32) -> Result<()> {
    let path = path.as_ref();
    if frames.is_empty() {
        return Err(GanError::artifact(path, "no frames to animate"));
    }
    if fps == 0 {
        return Err(GanError::Config("animation fps must be > 0".into()));
    }

    let delay = Delay::from_numer_denom_ms(1000, fps);
    let decoded = frames
        .iter()
        .map(|frame| {
            let image = image::open(frame).map_err(|e| GanError::artifact(frame, e))?;
            Ok(Frame::from_parts(image.to_rgba8(), 0, 0, delay))
        })
        .collect::<Result<Vec<_>>>()?;

    let file = File::create(path).map_err(|e| GanError::artifact(path, e))?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|e| GanError::artifact(path, e))?;
    encoder
        .encode_frames(decoded)
        .map_err(|e| GanError::artifact(path, e))?;

    tracing::info!("Wrote {} frame animation to {}", frames.len(), path.display());
    Ok(())
}
