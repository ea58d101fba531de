use crate::core_modules::frame::{CHANNELS, Frame};
use crate::error::Result;
use crate::interfaces::PreviewSink;
use image::ImageEncoder;
use std::path::{Path, PathBuf};
use tracing::debug;

const BANNER_HEIGHT: u32 = 12;
const BANNER_RGBA: [u8; 4] = [0, 255, 0, 255];

/// Encodes an RGBA buffer as PNG.
pub fn save(path: &Path, width: u32, height: u32, buffer: &[u8]) -> Result<()> {
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(output);
    encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgba8)?;
    Ok(())
}

/// Copies the frame and paints a banner across the top when motion was detected.
pub fn annotate(frame: &Frame, motion: bool) -> Vec<u8> {
    let mut buffer = frame.data.clone();
    if motion {
        let rows = BANNER_HEIGHT.min(frame.height) as usize;
        for px in buffer[..rows * frame.width as usize * CHANNELS].chunks_mut(CHANNELS) {
            px.copy_from_slice(&BANNER_RGBA);
        }
    }
    buffer
}

/// Keeps the latest annotated frame in a PNG file.
pub struct PngPreview {
    path: PathBuf,
}

impl PngPreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreviewSink for PngPreview {
    fn present(&mut self, frame: &Frame, motion: bool) {
        let buffer = annotate(frame, motion);
        if let Err(err) = save(&self.path, frame.width, frame.height, &buffer) {
            debug!(%err, path = %self.path.display(), "could not write preview");
        }
    }
}
