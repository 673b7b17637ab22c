//! PNG to packed frame converter
//!
//! Packs one image the same way the streamer does and writes the raw
//! 1-bit frame, printing enough of it to compare against a capture.

use std::env;
use std::fs;
use std::path::PathBuf;

use frame_protocol::{pack_image, BYTES_PER_ROW, FRAME_BYTES, FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH};

const PREVIEW_BYTES: usize = 32;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let input = args.next().ok_or("usage: png_to_frame <input.png> [output.bin]")?;
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&input).with_extension("bin"));

    println!("Converting {} to a {}×{} frame...", input, FRAME_WIDTH, FRAME_HEIGHT);

    let img = image::open(&input)?;
    println!("Original image: {}×{}", img.width(), img.height());

    let frame = pack_image(&img)?;

    fs::write(&output, frame.as_bytes())?;

    println!("Generated {}", output.display());
    println!("Size: {} bytes (expected {})", frame.as_bytes().len(), FRAME_BYTES);
    println!("Bytes per row: {}", BYTES_PER_ROW);
    println!("Lit pixels: {}/{}", frame.lit_pixels(), FRAME_PIXELS);
    println!(
        "First {} bytes: {}",
        PREVIEW_BYTES,
        hex::encode(&frame.as_bytes()[..PREVIEW_BYTES])
    );

    Ok(())
}
