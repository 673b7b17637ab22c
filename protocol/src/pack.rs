//! Image to frame conversion shared by the streamer and the tools.

use image::imageops::FilterType;
use image::DynamicImage;

use crate::{Frame, FrameError, FRAME_HEIGHT, FRAME_WIDTH};

/// Scale `image` to the frame size with a linear filter, convert it to
/// grayscale and threshold it into a packed frame
pub fn pack_image(image: &DynamicImage) -> Result<Frame, FrameError> {
    let gray = image
        .resize_exact(FRAME_WIDTH as u32, FRAME_HEIGHT as u32, FilterType::Triangle)
        .to_luma8();
    Frame::from_luma(gray.as_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage, Rgb};

    #[test]
    fn test_bright_color_image_packs_on() {
        let rgb = RgbImage::from_pixel(64, 48, Rgb([250, 250, 250]));
        assert_eq!(pack_image(&DynamicImage::ImageRgb8(rgb)).unwrap(), Frame::filled(true));
    }

    #[test]
    fn test_halves_keep_their_side() {
        let gray = GrayImage::from_fn(FRAME_WIDTH as u32, FRAME_HEIGHT as u32, |_, y| {
            if (y as usize) < FRAME_HEIGHT / 2 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let frame = pack_image(&DynamicImage::ImageLuma8(gray)).unwrap();

        assert!(frame.row(0).iter().all(|&b| b == 0x00));
        assert!(frame.row(FRAME_HEIGHT - 1).iter().all(|&b| b == 0xFF));
    }
}
