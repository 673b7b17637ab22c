use crate::{Frame, ACK_BYTE, FRAME_BYTES};

/// Byte link the receiver pulls frames from.
///
/// Implementations wrap a serial port; the receiver never assumes anything
/// about framing beyond what these three operations give it.
#[allow(async_fn_in_trait)]
pub trait FrameLink {
    type Error;

    /// Drop every byte already buffered but not yet consumed.
    async fn discard_pending(&mut self);

    /// Fill `buf` from the link, giving up once the link stays idle for the
    /// configured timeout. Returns how many bytes were written into `buf`.
    async fn read_exact_or_timeout(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Send the acknowledgement byte back to the sender.
    async fn write_ack(&mut self, byte: u8) -> Result<(), Self::Error>;
}

/// Result of one receive attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Received<'a> {
    /// Exactly one frame's worth of bytes arrived
    Frame(&'a Frame),
    /// The link went idle after this many bytes
    Short(usize),
}

impl<'a> Received<'a> {
    pub fn frame(self) -> Option<&'a Frame> {
        match self {
            Received::Frame(frame) => Some(frame),
            Received::Short(_) => None,
        }
    }
}

/// Pulls whole frames off a [`FrameLink`] into a single reused buffer.
pub struct FrameReceiver<L> {
    link: L,
    frame: Frame,
}

impl<L: FrameLink> FrameReceiver<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            frame: Frame::new(),
        }
    }

    /// Flush stale input, then try to read one frame.
    ///
    /// A read that comes up short yields [`Received::Short`]; the partial data
    /// stays in the buffer but must not be rendered.
    pub async fn receive(&mut self) -> Result<Received<'_>, L::Error> {
        self.link.discard_pending().await;

        let received = self
            .link
            .read_exact_or_timeout(self.frame.as_bytes_mut())
            .await?;

        if received == FRAME_BYTES {
            Ok(Received::Frame(&self.frame))
        } else {
            Ok(Received::Short(received))
        }
    }

    /// Tell the sender the last frame was consumed
    pub async fn acknowledge(&mut self) -> Result<(), L::Error> {
        self.link.write_ack(ACK_BYTE).await
    }

    /// Frame buffer, for drawing into it outside the receive cycle
    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}
