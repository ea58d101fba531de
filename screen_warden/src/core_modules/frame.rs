// THEORY:
// The `frame` module holds the two image representations the detectors work with.
//
// 1.  **Frame**: a "dumb" RGBA byte buffer exactly as the capture collaborator hands
//     it over. It knows its dimensions and nothing else.
// 2.  **GrayFrame**: the analysis form. A frame is reduced to Rec. 601 luminance and
//     then smoothed with a wide Gaussian so single-pixel sensor noise never reaches
//     the differencing stages. Both the running background and the empty-room
//     reference are built from this form, so the two detectors always compare
//     like with like.

use image::{GrayImage, ImageBuffer, Luma};

pub const CHANNELS: usize = 4;

/// Sigma equivalent to a 21x21 Gaussian kernel with automatic sigma.
pub const BLUR_SIGMA: f32 = 3.5;

/// A single captured RGBA frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// Wraps an RGBA buffer. Returns `None` for an empty frame or a buffer that does
    /// not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let frame = Self { width, height, data };
        frame.is_valid().then_some(frame)
    }

    /// Non-empty, with exactly `width * height` RGBA pixels.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * CHANNELS
    }

    /// A frame filled with one opaque gray level.
    pub fn solid(width: u32, height: u32, level: u8) -> Self {
        let mut data = vec![255u8; width as usize * height as usize * CHANNELS];
        for px in data.chunks_mut(CHANNELS) {
            px[0] = level;
            px[1] = level;
            px[2] = level;
        }
        Self { width, height, data }
    }

    /// Paints an opaque gray rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, level: u8) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for py in y..y_end {
            for px in x..x_end {
                let i = (py as usize * self.width as usize + px as usize) * CHANNELS;
                self.data[i] = level;
                self.data[i + 1] = level;
                self.data[i + 2] = level;
                self.data[i + 3] = 255;
            }
        }
    }
}

/// Rec. 601 luma, the same weighting used for BGR-to-gray conversion in capture libraries.
#[inline]
pub fn luminance(red: u8, green: u8, blue: u8) -> f32 {
    0.299 * red as f32 + 0.587 * green as f32 + 0.114 * blue as f32
}

/// A blurred grayscale frame. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    image: GrayImage,
}

impl GrayFrame {
    /// Converts to luminance and applies the noise-suppression blur.
    /// Returns `None` for frames that fail `Frame::is_valid`.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if !frame.is_valid() {
            return None;
        }
        let gray: GrayImage = ImageBuffer::from_fn(frame.width, frame.height, |x, y| {
            let i = (y as usize * frame.width as usize + x as usize) * CHANNELS;
            let px = &frame.data[i..i + CHANNELS];
            Luma([luminance(px[0], px[1], px[2]).round().clamp(0.0, 255.0) as u8])
        });
        Some(Self {
            image: image::imageops::blur(&gray, BLUR_SIGMA),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn same_dimensions(&self, other: &GrayFrame) -> bool {
        self.image.dimensions() == other.image.dimensions()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Sum of a binarized difference image: every pixel whose delta is strictly above
/// `pixel_delta` contributes 255, every other pixel contributes 0.
pub fn binarized_sum<I>(deltas: I, pixel_delta: u8) -> u64
where
    I: IntoIterator<Item = u8>,
{
    deltas.into_iter().filter(|&d| d > pixel_delta).count() as u64 * 255
}
