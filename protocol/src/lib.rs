#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! Shared definitions for the monochrome frame link.
//!
//! The sender packs a `FRAME_WIDTH` x `FRAME_HEIGHT` bitmap into
//! [`FRAME_BYTES`] bytes (row-major, MSB = leftmost pixel) and writes it raw,
//! with no header or delimiter. The receiver answers every rendered frame with
//! a single [`ACK_BYTE`] and the sender must wait for it before sending the
//! next frame.

pub mod frame;
#[cfg(feature = "image")]
pub mod pack;
pub mod receiver;
pub mod renderer;
pub mod splash;
pub mod stream;

#[cfg(test)]
mod mock;

pub use frame::{Frame, FrameError};
#[cfg(feature = "image")]
pub use pack::pack_image;
pub use receiver::{FrameLink, FrameReceiver, Received};
pub use renderer::{row_span, FrameRenderer, Palette, ScanlineDisplay};
pub use splash::draw_splash;
pub use stream::{CycleOutcome, StreamError, StreamState, StreamStats, Streamer};

/// Frame width in pixels
pub const FRAME_WIDTH: usize = 128;

/// Frame height in pixels
pub const FRAME_HEIGHT: usize = 96;

/// Packed bytes per frame row (8 pixels per byte)
pub const BYTES_PER_ROW: usize = FRAME_WIDTH / 8;

/// Pixels per frame
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Exact size of one frame on the wire
pub const FRAME_BYTES: usize = FRAME_PIXELS / 8;

/// Serial link speed shared by sender and receiver
pub const LINK_BAUD: u32 = 921_600;

/// Byte sent back after each rendered frame
pub const ACK_BYTE: u8 = 0xAA;

/// Idle time after which a partial read is abandoned
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Luminance above this value packs to a set bit
pub const LUMA_THRESHOLD: u8 = 128;

const _: () = assert!(FRAME_WIDTH % 8 == 0 && FRAME_HEIGHT % 8 == 0);

/// Receiver-side link settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    pub baud: u32,
    pub read_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud: LINK_BAUD,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}
