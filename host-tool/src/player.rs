//! Timeline-driven playback.
//!
//! Playback follows a logical clock instead of pushing frames back to back:
//! the clock advances by real elapsed time times the speed multiplier, and a
//! frame is sent only when the clock crosses into a new frame. Commands can
//! pause, seek and change speed while the player runs.

use anyhow::Result;
use frame_protocol::Frame;
use indicatif::ProgressBar;
use std::future::pending;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::serial::{AckStatus, SerialConnection};

pub const DEFAULT_BASE_FPS: f64 = 15.0;
pub const DEFAULT_LOOP_RATE: f64 = 120.0;
pub const MIN_SPEED: f64 = 0.1;

/// Speeds visited by [`PlayerCommand::SpeedStep`]
pub const SPEED_STEPS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Relative seek sizes, in seconds
pub const SEEK_SMALL: f64 = 5.0;
pub const SEEK_BIG: f64 = 10.0;

/// Longest step the clock takes at once, so a stall doesn't skip ahead
const MAX_STEP: Duration = Duration::from_millis(250);

/// Absorbs rounding in `position * base_fps` right after a seek
const INDEX_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Timeline {
    total_frames: usize,
    base_fps: f64,
    speed: f64,
    looping: bool,
    paused: bool,
    /// Seconds of video
    position: f64,
}

impl Timeline {
    pub fn new(total_frames: usize, base_fps: f64) -> Self {
        Self {
            total_frames,
            base_fps,
            speed: 1.0,
            looping: false,
            paused: false,
            position: 0.0,
        }
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        self.speed = multiplier.max(MIN_SPEED);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Move `steps` entries along [`SPEED_STEPS`] from the entry closest to
    /// the current speed, stopping at either end
    pub fn step_speed(&mut self, steps: i32) {
        let current = SPEED_STEPS
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - self.speed).abs().total_cmp(&(*b - self.speed).abs())
            })
            .map(|(i, _)| i as i32)
            .unwrap_or(3);
        let next = (current + steps).clamp(0, SPEED_STEPS.len() as i32 - 1);
        self.set_speed(SPEED_STEPS[next as usize]);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn play(&mut self) {
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn toggle(&mut self) {
        self.paused = !self.paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn duration(&self) -> f64 {
        self.total_frames as f64 / self.base_fps
    }

    /// Jump so that `frame_index` is the current frame
    pub fn seek(&mut self, frame_index: usize) {
        if self.total_frames == 0 {
            return;
        }
        let index = frame_index.min(self.total_frames - 1);
        self.position = index as f64 / self.base_fps;
    }

    /// Jump by whole frames worth `seconds` of video, clamped to the clip
    pub fn seek_by(&mut self, seconds: f64) {
        let delta = (seconds * self.base_fps) as i64;
        let target = self.frame_index() as i64 + delta;
        self.seek(target.max(0) as usize);
    }

    pub fn rewind(&mut self) {
        self.seek(0);
    }

    /// Move the clock forward; a paused timeline stays put
    pub fn advance(&mut self, elapsed: Duration) {
        if self.paused {
            return;
        }
        let dt = elapsed.min(MAX_STEP).as_secs_f64();
        self.position += dt * self.speed;

        let duration = self.duration();
        if duration <= 0.0 {
            self.position = 0.0;
        } else if self.looping {
            self.position = self.position.rem_euclid(duration);
        } else {
            self.position = self.position.min(duration);
        }
    }

    pub fn frame_index(&self) -> usize {
        if self.total_frames == 0 {
            return 0;
        }
        ((self.position * self.base_fps + INDEX_EPSILON) as usize).min(self.total_frames - 1)
    }

    /// Only a non-looping timeline ever finishes
    pub fn is_finished(&self) -> bool {
        !self.looping && self.position >= self.duration()
    }
}

/// Control input for a running [`Player`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Toggle,
    Rewind,
    /// Relative seek in seconds of video
    SeekBy(f64),
    SeekTo(usize),
    Speed(f64),
    /// Move along [`SPEED_STEPS`]
    SpeedStep(i32),
    Stop,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseCommandError {
    #[error("unknown command: {0:?}")]
    Unknown(String),
    #[error("invalid number in {0:?}")]
    InvalidNumber(String),
}

impl FromStr for PlayerCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let invalid = || ParseCommandError::InvalidNumber(line.to_string());

        let command = match line {
            "" | "t" | "toggle" => PlayerCommand::Toggle,
            "play" => PlayerCommand::Play,
            "p" | "pause" => PlayerCommand::Pause,
            "r" | "rewind" => PlayerCommand::Rewind,
            "<" => PlayerCommand::SeekBy(-SEEK_SMALL),
            ">" => PlayerCommand::SeekBy(SEEK_SMALL),
            "j" => PlayerCommand::SeekBy(-SEEK_BIG),
            "l" => PlayerCommand::SeekBy(SEEK_BIG),
            "," => PlayerCommand::SpeedStep(-1),
            "." => PlayerCommand::SpeedStep(1),
            "q" | "quit" | "stop" => PlayerCommand::Stop,
            _ => {
                if let Some(value) = line.strip_prefix("speed ") {
                    PlayerCommand::Speed(value.trim().parse().map_err(|_| invalid())?)
                } else if let Some(value) = line.strip_prefix("goto ") {
                    PlayerCommand::SeekTo(value.trim().parse().map_err(|_| invalid())?)
                } else if line.starts_with('+') || line.starts_with('-') {
                    PlayerCommand::SeekBy(line.parse().map_err(|_| invalid())?)
                } else {
                    return Err(ParseCommandError::Unknown(line.to_string()));
                }
            }
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub sent: u64,
    pub acked: u64,
    pub unexpected: u64,
    pub timed_out: u64,
}

impl PlaybackStats {
    fn record(&mut self, status: AckStatus) {
        self.sent += 1;
        match status {
            AckStatus::Acked => self.acked += 1,
            AckStatus::Unexpected(_) => self.unexpected += 1,
            AckStatus::TimedOut => self.timed_out += 1,
        }
    }
}

/// Next command, or never once the sending side is gone
async fn next_command(commands: &mut Option<mpsc::Receiver<PlayerCommand>>) -> PlayerCommand {
    let received = match commands.as_mut() {
        Some(rx) => rx.recv().await,
        None => None,
    };
    match received {
        Some(command) => command,
        None => {
            *commands = None;
            pending().await
        }
    }
}

pub struct Player<S> {
    connection: SerialConnection<S>,
    frames: Vec<Frame>,
    timeline: Timeline,
    tick: Duration,
    commands: Option<mpsc::Receiver<PlayerCommand>>,
    stats: PlaybackStats,
}

impl<S> Player<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(connection: SerialConnection<S>, frames: Vec<Frame>, timeline: Timeline) -> Self {
        Self {
            connection,
            frames,
            timeline,
            tick: Duration::from_secs_f64(1.0 / DEFAULT_LOOP_RATE),
            commands: None,
            stats: PlaybackStats::default(),
        }
    }

    pub fn with_loop_rate(mut self, hz: f64) -> Self {
        self.tick = Duration::from_secs_f64(1.0 / hz.max(1.0));
        self
    }

    pub fn with_commands(mut self, commands: mpsc::Receiver<PlayerCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Apply one command. Returns `false` when playback should end.
    fn apply(&mut self, command: PlayerCommand, progress: &ProgressBar) -> bool {
        let timeline = &mut self.timeline;
        match command {
            PlayerCommand::Play => timeline.play(),
            PlayerCommand::Pause => timeline.pause(),
            PlayerCommand::Toggle => timeline.toggle(),
            PlayerCommand::Rewind => timeline.rewind(),
            PlayerCommand::SeekBy(seconds) => timeline.seek_by(seconds),
            PlayerCommand::SeekTo(index) => timeline.seek(index),
            PlayerCommand::Speed(multiplier) => timeline.set_speed(multiplier),
            PlayerCommand::SpeedStep(steps) => timeline.step_speed(steps),
            PlayerCommand::Stop => return false,
        }

        let state = if timeline.is_paused() { "paused" } else { "playing" };
        progress.set_message(format!("{} x{}", state, timeline.speed()));
        true
    }

    /// Play until the timeline finishes or a [`PlayerCommand::Stop`] arrives.
    /// A looping timeline without commands never finishes, so the caller is
    /// expected to cancel the future.
    pub async fn run(&mut self, progress: &ProgressBar) -> Result<PlaybackStats> {
        if self.frames.is_empty() {
            return Ok(self.stats);
        }

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_sent = None;
        let mut last_tick = Instant::now();

        loop {
            let index = self.timeline.frame_index();
            if last_sent != Some(index) {
                let status = self.connection.send_frame(&self.frames[index]).await?;
                if status != AckStatus::Acked {
                    progress.set_message(format!("frame {}: {:?}", index, status));
                }
                self.stats.record(status);
                progress.set_position(index as u64 + 1);
                last_sent = Some(index);
            }

            if self.timeline.is_finished() {
                return Ok(self.stats);
            }

            let command = tokio::select! {
                _ = ticker.tick() => None,
                command = next_command(&mut self.commands) => Some(command),
            };

            let now = Instant::now();
            self.timeline.advance(now - last_tick);
            last_tick = now;

            if let Some(command) = command {
                if !self.apply(command, progress) {
                    return Ok(self.stats);
                }
            }
        }
    }
}
