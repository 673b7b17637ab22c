//! In-memory link and display used by the unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::RgbColor;

use crate::receiver::FrameLink;
use crate::renderer::ScanlineDisplay;
use crate::{Frame, FRAME_HEIGHT, FRAME_WIDTH};

/// What the sender does next, from the receiver's point of view
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A burst of bytes lands in the receive buffer
    Bytes(Vec<u8>),
    /// Nothing arrives until the read times out
    Stall,
    /// The port reports an error
    Fail,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockLinkError;

pub struct MockLink {
    pub buffered: VecDeque<u8>,
    pub script: VecDeque<LinkEvent>,
    pub acks: Vec<u8>,
    pub flushes: usize,
    pub fail_ack: bool,
}

impl MockLink {
    pub fn new(script: Vec<LinkEvent>) -> Self {
        Self {
            buffered: VecDeque::new(),
            script: script.into(),
            acks: Vec::new(),
            flushes: 0,
            fail_ack: false,
        }
    }

    /// Bytes already sitting in the receive buffer before the first cycle
    pub fn with_buffered(mut self, bytes: &[u8]) -> Self {
        self.buffered.extend(bytes.iter().copied());
        self
    }

    /// Queue more sender activity
    pub fn push(&mut self, event: LinkEvent) {
        self.script.push_back(event);
    }
}

impl FrameLink for MockLink {
    type Error = MockLinkError;

    async fn discard_pending(&mut self) {
        self.buffered.clear();
        self.flushes += 1;
    }

    async fn read_exact_or_timeout(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut filled = 0;
        loop {
            while filled < buf.len() {
                match self.buffered.pop_front() {
                    Some(byte) => {
                        buf[filled] = byte;
                        filled += 1;
                    }
                    None => break,
                }
            }
            if filled == buf.len() {
                return Ok(filled);
            }

            match self.script.pop_front() {
                Some(LinkEvent::Bytes(bytes)) => self.buffered.extend(bytes),
                Some(LinkEvent::Fail) => return Err(MockLinkError),
                Some(LinkEvent::Stall) | None => return Ok(filled),
            }
        }
    }

    async fn write_ack(&mut self, byte: u8) -> Result<(), Self::Error> {
        if self.fail_ack {
            return Err(MockLinkError);
        }
        self.acks.push(byte);
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockDisplayError;

/// Panel with pixel readback. Unwritten pixels read as `None`.
pub struct MockDisplay {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Option<Rgb565>>,
    pub row_writes: Vec<(u16, u16, usize)>,
    pub fills: Vec<Rgb565>,
    pub fail_rows: bool,
}

impl MockDisplay {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; width * height],
            row_writes: Vec::new(),
            fills: Vec::new(),
            fail_rows: false,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb565> {
        self.pixels[y * self.width + x]
    }

    /// Decode the frame-sized region at (x0, y0) back into bits
    pub fn read_back_frame(&self, x0: usize, y0: usize) -> Frame {
        let mut frame = Frame::new();
        for y in 0..FRAME_HEIGHT {
            for x in 0..FRAME_WIDTH {
                if self.pixel(x0 + x, y0 + y) == Some(Rgb565::WHITE) {
                    frame.set_pixel(x, y, true);
                }
            }
        }
        frame
    }
}

impl ScanlineDisplay for MockDisplay {
    type Color = Rgb565;
    type Error = MockDisplayError;

    async fn fill_screen(&mut self, color: Rgb565) -> Result<(), Self::Error> {
        self.pixels.fill(Some(color));
        self.fills.push(color);
        Ok(())
    }

    async fn write_row(&mut self, x: u16, y: u16, row: &[Rgb565]) -> Result<(), Self::Error> {
        if self.fail_rows {
            return Err(MockDisplayError);
        }
        let start = y as usize * self.width + x as usize;
        for (i, &color) in row.iter().enumerate() {
            self.pixels[start + i] = Some(color);
        }
        self.row_writes.push((x, y, row.len()));
        Ok(())
    }
}
