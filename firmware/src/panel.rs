//! Minimal GC9307 TFT driver.
//!
//! Only what the frame receiver needs: bring the controller up in landscape
//! RGB565 mode, fill the panel, and stream horizontal pixel runs.

use embassy_time::Timer;
use embedded_graphics::pixelcolor::raw::{RawU16, ToBytes};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiDevice;
use frame_protocol::{row_span, ScanlineDisplay};

/// Visible area in landscape orientation
pub const PANEL_WIDTH: u16 = 320;
pub const PANEL_HEIGHT: u16 = 172;

/// GC9307 RAM is 240 rows tall; the 172-row glass starts at row 34
const OFFSET_X: u16 = 0;
const OFFSET_Y: u16 = 34;

/// MIPI DCS commands used by this driver
#[allow(dead_code)]
mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const INVOFF: u8 = 0x20;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
}

/// Row/column exchange + column mirror + BGR order
const MADCTL_LANDSCAPE_BGR: u8 = 0x68;
/// 16 bits per pixel
const COLMOD_RGB565: u8 = 0x55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PanelError {
    Spi,
    Pin,
    OutOfBounds,
}

pub struct Gc9307<SPI, DC, RST> {
    spi: SPI,
    dc: DC,
    rst: RST,
    /// One panel row of big-endian RGB565
    line: [u8; PANEL_WIDTH as usize * 2],
}

impl<SPI, DC, RST> Gc9307<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, rst: RST) -> Self {
        Self {
            spi,
            dc,
            rst,
            line: [0; PANEL_WIDTH as usize * 2],
        }
    }

    /// Hardware reset and controller bring-up
    pub async fn init(&mut self) -> Result<(), PanelError> {
        self.rst.set_low().map_err(|_| PanelError::Pin)?;
        Timer::after_millis(10).await;
        self.rst.set_high().map_err(|_| PanelError::Pin)?;
        Timer::after_millis(120).await;

        self.command(cmd::SWRESET, &[]).await?;
        Timer::after_millis(150).await;
        self.command(cmd::SLPOUT, &[]).await?;
        Timer::after_millis(120).await;

        self.command(cmd::COLMOD, &[COLMOD_RGB565]).await?;
        self.command(cmd::MADCTL, &[MADCTL_LANDSCAPE_BGR]).await?;
        self.command(cmd::INVOFF, &[]).await?;
        self.command(cmd::DISPON, &[]).await?;
        Timer::after_millis(20).await;

        defmt::info!("GC9307 ready ({}x{})", PANEL_WIDTH, PANEL_HEIGHT);
        Ok(())
    }

    async fn command(&mut self, command: u8, params: &[u8]) -> Result<(), PanelError> {
        self.dc.set_low().map_err(|_| PanelError::Pin)?;
        self.spi.write(&[command]).await.map_err(|_| PanelError::Spi)?;
        if !params.is_empty() {
            self.dc.set_high().map_err(|_| PanelError::Pin)?;
            self.spi.write(params).await.map_err(|_| PanelError::Spi)?;
        }
        Ok(())
    }

    /// Select the inclusive window (x0, y0)..=(x1, y1) and start a RAM write
    async fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), PanelError> {
        let (xs, xe) = (x0 + OFFSET_X, x1 + OFFSET_X);
        let (ys, ye) = (y0 + OFFSET_Y, y1 + OFFSET_Y);

        let [xs_hi, xs_lo] = xs.to_be_bytes();
        let [xe_hi, xe_lo] = xe.to_be_bytes();
        self.command(cmd::CASET, &[xs_hi, xs_lo, xe_hi, xe_lo]).await?;

        let [ys_hi, ys_lo] = ys.to_be_bytes();
        let [ye_hi, ye_lo] = ye.to_be_bytes();
        self.command(cmd::RASET, &[ys_hi, ys_lo, ye_hi, ye_lo]).await?;

        self.command(cmd::RAMWR, &[]).await?;
        self.dc.set_high().map_err(|_| PanelError::Pin)
    }

    fn encode_line(&mut self, colors: impl Iterator<Item = Rgb565>) -> usize {
        let mut len = 0;
        for (chunk, color) in self.line.chunks_exact_mut(2).zip(colors) {
            chunk.copy_from_slice(&RawU16::from(color).to_be_bytes());
            len += 2;
        }
        len
    }
}

impl<SPI, DC, RST> ScanlineDisplay for Gc9307<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    type Color = Rgb565;
    type Error = PanelError;

    async fn fill_screen(&mut self, color: Rgb565) -> Result<(), Self::Error> {
        let len = self.encode_line(core::iter::repeat(color).take(PANEL_WIDTH as usize));
        self.set_window(0, 0, PANEL_WIDTH - 1, PANEL_HEIGHT - 1).await?;
        for _ in 0..PANEL_HEIGHT {
            self.spi
                .write(&self.line[..len])
                .await
                .map_err(|_| PanelError::Spi)?;
        }
        Ok(())
    }

    async fn write_row(&mut self, x: u16, y: u16, row: &[Rgb565]) -> Result<(), Self::Error> {
        if row.is_empty() {
            return Ok(());
        }
        let x_end =
            row_span(x, y, row.len(), PANEL_WIDTH, PANEL_HEIGHT).ok_or(PanelError::OutOfBounds)?;

        let len = self.encode_line(row.iter().copied());
        self.set_window(x, y, x_end, y).await?;
        self.spi
            .write(&self.line[..len])
            .await
            .map_err(|_| PanelError::Spi)
    }
}
