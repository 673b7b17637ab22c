use core::convert::Infallible;
use core::fmt;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Size};

use crate::{BYTES_PER_ROW, FRAME_BYTES, FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH, LUMA_THRESHOLD};

/// Errors building a frame from external data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Input does not have the one length a frame can have
    InvalidLength { expected: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidLength { expected, actual } => {
                write!(f, "invalid frame length: expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

/// One packed 1-bit-per-pixel frame.
///
/// Rows are stored top to bottom, [`BYTES_PER_ROW`] bytes each; within a byte
/// bit 7 is the leftmost pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_BYTES],
}

impl Frame {
    /// All pixels off
    pub const fn new() -> Self {
        Self {
            bytes: [0; FRAME_BYTES],
        }
    }

    /// All pixels set to `on`
    pub const fn filled(on: bool) -> Self {
        Self {
            bytes: [if on { 0xFF } else { 0x00 }; FRAME_BYTES],
        }
    }

    /// Copy a frame out of a wire buffer, which must be exactly [`FRAME_BYTES`] long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_BYTES {
            return Err(FrameError::InvalidLength {
                expected: FRAME_BYTES,
                actual: bytes.len(),
            });
        }

        let mut frame = Self::new();
        frame.bytes.copy_from_slice(bytes);
        Ok(frame)
    }

    /// Pack 8-bit luminance samples (one per pixel, row-major).
    ///
    /// A pixel is on when its sample is strictly above [`LUMA_THRESHOLD`].
    pub fn from_luma(luma: &[u8]) -> Result<Self, FrameError> {
        if luma.len() != FRAME_PIXELS {
            return Err(FrameError::InvalidLength {
                expected: FRAME_PIXELS,
                actual: luma.len(),
            });
        }

        let mut frame = Self::new();
        for (i, &sample) in luma.iter().enumerate() {
            if sample > LUMA_THRESHOLD {
                frame.bytes[i >> 3] |= 1 << (7 - (i & 7));
            }
        }
        Ok(frame)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_BYTES] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; FRAME_BYTES] {
        &mut self.bytes
    }

    /// Packed bytes of row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= FRAME_HEIGHT`. Unlike [`Frame::pixel`] there is no
    /// sensible empty row to hand back.
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * BYTES_PER_ROW;
        &self.bytes[start..start + BYTES_PER_ROW]
    }

    /// Whether the pixel at (x, y) is on. Out-of-range coordinates read as off.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= FRAME_WIDTH || y >= FRAME_HEIGHT {
            return false;
        }
        self.bytes[y * BYTES_PER_ROW + (x >> 3)] & (1 << (7 - (x & 7))) != 0
    }

    /// Set one pixel; out-of-range coordinates are ignored
    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        if x >= FRAME_WIDTH || y >= FRAME_HEIGHT {
            return;
        }
        let mask = 1 << (7 - (x & 7));
        let byte = &mut self.bytes[y * BYTES_PER_ROW + (x >> 3)];
        if on {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    pub fn clear(&mut self, on: bool) {
        self.bytes.fill(if on { 0xFF } else { 0x00 });
    }

    /// Number of pixels that are on
    pub fn lit_pixels(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("lit_pixels", &self.lit_pixels())
            .finish()
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(FRAME_WIDTH as u32, FRAME_HEIGHT as u32)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            self.set_pixel(point.x as usize, point.y as usize, color.is_on());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        Frame::clear(self, color.is_on());
        Ok(())
    }
}
