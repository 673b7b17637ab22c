//! The receive → render → acknowledge loop.

use core::fmt;

use crate::receiver::{FrameLink, FrameReceiver, Received};
use crate::renderer::{FrameRenderer, ScanlineDisplay};
use crate::splash::draw_splash;

/// Where the streamer is in its lifetime. There is no way back to `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    /// Booted, splash on screen, no frame rendered yet
    Waiting,
    /// At least one frame rendered and acknowledged
    Streaming,
}

/// What a single cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// A full frame was drawn and acknowledged
    Rendered,
    /// The read came up short; nothing drawn, nothing acknowledged
    Dropped { received: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError<L, D> {
    /// Serial link failed while reading or acknowledging
    Link(L),
    /// Display rejected a transfer; the frame was not acknowledged
    Display(D),
}

impl<L: fmt::Debug, D: fmt::Debug> fmt::Display for StreamError<L, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Link(e) => write!(f, "link error: {:?}", e),
            StreamError::Display(e) => write!(f, "display error: {:?}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamStats {
    pub frames_rendered: u32,
    pub reads_dropped: u32,
}

/// Owns the receiver, renderer and display and runs them in lockstep.
pub struct Streamer<L, D: ScanlineDisplay> {
    receiver: FrameReceiver<L>,
    renderer: FrameRenderer<D::Color>,
    display: D,
    state: StreamState,
    stats: StreamStats,
}

impl<L, D> Streamer<L, D>
where
    L: FrameLink,
    D: ScanlineDisplay,
{
    pub fn new(link: L, display: D, renderer: FrameRenderer<D::Color>) -> Self {
        Self {
            receiver: FrameReceiver::new(link),
            renderer,
            display,
            state: StreamState::Waiting,
            stats: StreamStats::default(),
        }
    }

    /// Clear the panel and show `lines` as the waiting screen.
    ///
    /// The text is drawn into the frame buffer and rendered like any frame,
    /// but nothing is acknowledged.
    pub async fn show_splash(&mut self, lines: &[&str]) -> Result<(), D::Error> {
        let off = self.renderer.palette().off;
        self.display.fill_screen(off).await?;

        draw_splash(self.receiver.frame_mut(), lines);
        self.renderer
            .draw(self.receiver.frame(), &mut self.display)
            .await
    }

    /// Run one receive → render → acknowledge cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, StreamError<L::Error, D::Error>> {
        let frame = match self.receiver.receive().await.map_err(StreamError::Link)? {
            Received::Frame(frame) => frame,
            Received::Short(received) => {
                self.stats.reads_dropped = self.stats.reads_dropped.wrapping_add(1);
                return Ok(CycleOutcome::Dropped { received });
            }
        };

        self.renderer
            .draw(frame, &mut self.display)
            .await
            .map_err(StreamError::Display)?;

        self.receiver
            .acknowledge()
            .await
            .map_err(StreamError::Link)?;

        self.state = StreamState::Streaming;
        self.stats.frames_rendered = self.stats.frames_rendered.wrapping_add(1);
        Ok(CycleOutcome::Rendered)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn link(&self) -> &L {
        self.receiver.link()
    }

    pub fn link_mut(&mut self) -> &mut L {
        self.receiver.link_mut()
    }
}
