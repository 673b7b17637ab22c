use embedded_graphics::pixelcolor::{BinaryColor, Rgb565};
use embedded_graphics::prelude::RgbColor;

use crate::{Frame, FRAME_HEIGHT, FRAME_WIDTH};

/// Display surface the renderer draws onto.
#[allow(async_fn_in_trait)]
pub trait ScanlineDisplay {
    type Color: Copy;
    type Error;

    /// Fill the whole surface with one color
    async fn fill_screen(&mut self, color: Self::Color) -> Result<(), Self::Error>;

    /// Write `row.len()` horizontal pixels starting at (x, y)
    async fn write_row(&mut self, x: u16, y: u16, row: &[Self::Color]) -> Result<(), Self::Error>;
}

const MAX_ORIGIN_X: u16 = u16::MAX - FRAME_WIDTH as u16;
const MAX_ORIGIN_Y: u16 = u16::MAX - FRAME_HEIGHT as u16;

/// Last column of a `len`-pixel run starting at (x, y), if the whole run fits
/// on a `width` x `height` surface.
pub fn row_span(x: u16, y: u16, len: usize, width: u16, height: u16) -> Option<u16> {
    if len == 0 || y >= height {
        return None;
    }
    let len = u16::try_from(len).ok()?;
    let end = x.checked_add(len - 1)?;
    (end < width).then_some(end)
}

/// Colors used for set and clear bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette<C> {
    pub on: C,
    pub off: C,
}

impl<C: Copy> Palette<C> {
    pub const fn new(on: C, off: C) -> Self {
        Self { on, off }
    }

    #[inline]
    pub fn color(&self, bit: bool) -> C {
        if bit {
            self.on
        } else {
            self.off
        }
    }
}

impl Default for Palette<Rgb565> {
    fn default() -> Self {
        Self::new(Rgb565::WHITE, Rgb565::BLACK)
    }
}

impl Default for Palette<BinaryColor> {
    fn default() -> Self {
        Self::new(BinaryColor::On, BinaryColor::Off)
    }
}

/// Expands packed frames into color rows, one scanline at a time.
pub struct FrameRenderer<C> {
    scanline: [C; FRAME_WIDTH],
    palette: Palette<C>,
    origin: (u16, u16),
}

impl<C: Copy> FrameRenderer<C> {
    pub fn new(palette: Palette<C>) -> Self {
        Self {
            scanline: [palette.off; FRAME_WIDTH],
            palette,
            origin: (0, 0),
        }
    }

    /// Place the frame's top-left corner at (x, y) on the display.
    ///
    /// The origin is clamped so the whole frame stays addressable in `u16`.
    pub fn with_origin(mut self, x: u16, y: u16) -> Self {
        self.origin = (x.min(MAX_ORIGIN_X), y.min(MAX_ORIGIN_Y));
        self
    }

    /// Origin that centers the frame on a `width` x `height` panel
    pub fn centered_on(self, width: u16, height: u16) -> Self {
        let x = width.saturating_sub(FRAME_WIDTH as u16) / 2;
        let y = height.saturating_sub(FRAME_HEIGHT as u16) / 2;
        self.with_origin(x, y)
    }

    pub fn palette(&self) -> &Palette<C> {
        &self.palette
    }

    pub fn origin(&self) -> (u16, u16) {
        self.origin
    }

    /// Decode row `y` of `frame` into the scanline buffer.
    ///
    /// # Panics
    ///
    /// Panics if `y >= FRAME_HEIGHT`, like [`Frame::row`].
    pub fn decode_row(&mut self, frame: &Frame, y: usize) -> &[C] {
        let row = frame.row(y);
        for (x, pixel) in self.scanline.iter_mut().enumerate() {
            let bit = row[x >> 3] & (1 << (7 - (x & 7))) != 0;
            *pixel = self.palette.color(bit);
        }
        &self.scanline
    }

    /// Draw `frame`, transferring each decoded row in a single display call
    pub async fn draw<D>(&mut self, frame: &Frame, display: &mut D) -> Result<(), D::Error>
    where
        D: ScanlineDisplay<Color = C>,
    {
        let (x0, y0) = self.origin;
        for y in 0..FRAME_HEIGHT {
            self.decode_row(frame, y);
            display.write_row(x0, y0 + y as u16, &self.scanline).await?;
        }
        Ok(())
    }
}

impl<C: Copy> Default for FrameRenderer<C>
where
    Palette<C>: Default,
{
    fn default() -> Self {
        Self::new(Palette::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDisplay;
    use crate::{BYTES_PER_ROW, FRAME_BYTES};
    use embassy_futures::block_on;

    fn patterned_frame() -> Frame {
        let bytes: Vec<u8> = (0..FRAME_BYTES)
            .map(|i| (i as u8).wrapping_mul(37) ^ 0xA5)
            .collect();
        Frame::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_decode_row_maps_bits_msb_first() {
        let mut bytes = vec![0u8; FRAME_BYTES];
        bytes[2 * BYTES_PER_ROW] = 0b1010_0000;
        let frame = Frame::from_bytes(&bytes).unwrap();
        let mut renderer = FrameRenderer::<Rgb565>::default();

        let row = renderer.decode_row(&frame, 2);
        assert_eq!(row.len(), FRAME_WIDTH);
        assert_eq!(row[0], Rgb565::WHITE);
        assert_eq!(row[1], Rgb565::BLACK);
        assert_eq!(row[2], Rgb565::WHITE);
        assert!(row[3..].iter().all(|&c| c == Rgb565::BLACK));
    }

    #[test]
    fn test_render_readback_reproduces_frame() {
        let frame = patterned_frame();
        let mut display = MockDisplay::new(FRAME_WIDTH, FRAME_HEIGHT);
        let mut renderer = FrameRenderer::<Rgb565>::default();

        block_on(renderer.draw(&frame, &mut display)).unwrap();

        assert_eq!(display.read_back_frame(0, 0), frame);
    }

    #[test]
    fn test_one_transfer_per_row() {
        let frame = patterned_frame();
        let mut display = MockDisplay::new(FRAME_WIDTH, FRAME_HEIGHT);
        let mut renderer = FrameRenderer::<Rgb565>::default();

        block_on(renderer.draw(&frame, &mut display)).unwrap();

        assert_eq!(display.row_writes.len(), FRAME_HEIGHT);
        for (y, &(x, row_y, len)) in display.row_writes.iter().enumerate() {
            assert_eq!((x, row_y as usize, len), (0, y, FRAME_WIDTH));
        }
    }

    #[test]
    fn test_blank_and_full_frames() {
        let mut display = MockDisplay::new(FRAME_WIDTH, FRAME_HEIGHT);
        let mut renderer = FrameRenderer::<Rgb565>::default();

        block_on(renderer.draw(&Frame::filled(false), &mut display)).unwrap();
        assert!(display.pixels.iter().all(|&c| c == Some(Rgb565::BLACK)));

        block_on(renderer.draw(&Frame::filled(true), &mut display)).unwrap();
        assert!(display.pixels.iter().all(|&c| c == Some(Rgb565::WHITE)));
    }

    #[test]
    fn test_centered_origin_offsets_rows() {
        let frame = patterned_frame();
        let mut display = MockDisplay::new(320, 172);
        let mut renderer = FrameRenderer::<Rgb565>::default().centered_on(320, 172);
        assert_eq!(renderer.origin(), (96, 38));

        block_on(renderer.draw(&frame, &mut display)).unwrap();

        assert_eq!(display.read_back_frame(96, 38), frame);
        assert_eq!(display.pixel(0, 0), None);
    }

    #[test]
    fn test_origin_is_clamped_to_addressable_range() {
        let renderer = FrameRenderer::<Rgb565>::default().with_origin(u16::MAX, u16::MAX - 10);
        assert_eq!(
            renderer.origin(),
            (u16::MAX - FRAME_WIDTH as u16, u16::MAX - FRAME_HEIGHT as u16)
        );

        let (x0, y0) = renderer.origin();
        assert!(x0.checked_add(FRAME_WIDTH as u16).is_some());
        assert!(y0.checked_add(FRAME_HEIGHT as u16 - 1).is_some());
    }

    #[test]
    fn test_row_span_bounds() {
        assert_eq!(row_span(0, 0, 128, 320, 172), Some(127));
        assert_eq!(row_span(192, 171, 128, 320, 172), Some(319));
        assert_eq!(row_span(193, 0, 128, 320, 172), None);
        assert_eq!(row_span(0, 172, 128, 320, 172), None);
        assert_eq!(row_span(5, 5, 0, 320, 172), None);
        // Would wrap in u16
        assert_eq!(row_span(u16::MAX - 10, 0, 128, u16::MAX, 172), None);
        assert_eq!(row_span(0, 0, 70_000, u16::MAX, 172), None);
    }

    #[test]
    #[should_panic]
    fn test_decode_row_past_last_row_panics() {
        let mut renderer = FrameRenderer::<Rgb565>::default();
        renderer.decode_row(&Frame::new(), FRAME_HEIGHT);
    }

    #[test]
    fn test_custom_palette() {
        let palette = Palette::new(Rgb565::GREEN, Rgb565::BLUE);
        let mut renderer = FrameRenderer::new(palette);
        let row = renderer.decode_row(&Frame::filled(true), 0);
        assert!(row.iter().all(|&c| c == Rgb565::GREEN));
    }
}
