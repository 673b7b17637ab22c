// Serial link between the frame sender and the panel

use embassy_stm32::usart::{self, BufferedUartRx, BufferedUartTx};
use embassy_time::{with_timeout, Duration};
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use frame_protocol::{FrameLink, LinkConfig};

/// Scratch size used while draining stale input
const DRAIN_CHUNK: usize = 64;

pub struct UartLink {
    rx: BufferedUartRx<'static>,
    tx: BufferedUartTx<'static>,
    idle_timeout: Duration,
}

impl UartLink {
    pub fn new(rx: BufferedUartRx<'static>, tx: BufferedUartTx<'static>, config: &LinkConfig) -> Self {
        Self {
            rx,
            tx,
            idle_timeout: Duration::from_millis(config.read_timeout_ms),
        }
    }
}

impl FrameLink for UartLink {
    type Error = usart::Error;

    async fn discard_pending(&mut self) {
        let mut scratch = [0u8; DRAIN_CHUNK];
        // Only what is already buffered; never waits for new bytes
        while let Ok(true) = self.rx.read_ready() {
            if self.rx.read(&mut scratch).await.is_err() {
                break;
            }
        }
    }

    async fn read_exact_or_timeout(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut filled = 0;
        while filled < buf.len() {
            match with_timeout(self.idle_timeout, self.rx.read(&mut buf[filled..])).await {
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) => return Err(e),
                // Link went quiet mid-frame
                Err(_) => break,
            }
        }
        Ok(filled)
    }

    async fn write_ack(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.tx.write_all(&[byte]).await?;
        self.tx.flush().await
    }
}
