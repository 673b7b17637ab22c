use anyhow::{Context, Result};
use frame_protocol::{Frame, ACK_BYTE, DEFAULT_READ_TIMEOUT_MS};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tokio_serial::SerialStream;

/// Boards that reset when the port opens need a moment before they listen
const PORT_OPEN_DELAY: Duration = Duration::from_secs(1);

/// Ack wait used unless overridden. Longer than the receiver's idle timeout,
/// so after a lost ack the receiver has already abandoned its partial read
/// before the next frame starts.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(DEFAULT_READ_TIMEOUT_MS + 500);

/// What came back after a frame was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Acked,
    Unexpected(u8),
    TimedOut,
}

pub struct SerialConnection<S = SerialStream> {
    port: S,
    ack_timeout: Duration,
    settle: Duration,
}

impl SerialConnection<SerialStream> {
    pub async fn open(port_name: &str, baud_rate: u32, ack_timeout: Duration) -> Result<Self> {
        let port = SerialStream::open(&tokio_serial::new(port_name, baud_rate))
            .with_context(|| format!("Failed to open serial port: {}", port_name))?;

        sleep(PORT_OPEN_DELAY).await;
        Ok(Self::from_stream(port, ack_timeout))
    }
}

impl<S> SerialConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_stream(port: S, ack_timeout: Duration) -> Self {
        Self {
            port,
            ack_timeout,
            settle: Duration::ZERO,
        }
    }

    /// Pause after every acknowledged frame before the next one may go out
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Write one frame and wait for the receiver's answer.
    ///
    /// A missing or wrong answer is reported, not treated as an error: the
    /// receiver drops partial frames on its own and the stream carries on.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<AckStatus> {
        self.port
            .write_all(frame.as_bytes())
            .await
            .context("Failed to write frame to serial port")?;
        self.port
            .flush()
            .await
            .context("Failed to flush serial port")?;

        let status = match timeout(self.ack_timeout, self.port.read_u8()).await {
            Ok(Ok(ACK_BYTE)) => AckStatus::Acked,
            Ok(Ok(other)) => AckStatus::Unexpected(other),
            Ok(Err(e)) => return Err(e).context("Serial read error while waiting for ack"),
            Err(_) => AckStatus::TimedOut,
        };

        if !self.settle.is_zero() {
            sleep(self.settle).await;
        }
        Ok(status)
    }
}
