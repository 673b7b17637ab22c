use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frame_protocol::{Frame, FRAME_BYTES, FRAME_HEIGHT, FRAME_WIDTH, LINK_BAUD};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::io::BufRead;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

mod frames;
mod player;
mod serial;

use player::{Player, PlayerCommand, Timeline, DEFAULT_BASE_FPS, DEFAULT_LOOP_RATE};
use serial::{AckStatus, SerialConnection, DEFAULT_ACK_TIMEOUT};

#[derive(Parser)]
#[command(name = "frame-streamer")]
#[command(about = "Stream monochrome frames to the frame receiver")]
#[command(version = "0.1.0")]
struct Cli {
    /// Serial port to connect to
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Baud rate, must match the receiver
    #[arg(short, long, default_value_t = LINK_BAUD)]
    baud: u32,

    /// How long to wait for the ack after each frame [default: 1.5s]
    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Pause after each ack before the next frame
    #[arg(long, value_parser = humantime::parse_duration, default_value = "2ms")]
    settle: Duration,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a directory of images or a packed .bin file
    Stream {
        /// Image directory, single image, or packed frame file
        source: PathBuf,
        /// Source frame rate
        #[arg(long, default_value_t = DEFAULT_BASE_FPS)]
        fps: f64,
        /// Playback speed multiplier (minimum 0.1)
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// First frame to show
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Wrap around at the end instead of stopping
        #[arg(long = "loop")]
        looping: bool,
        /// How often the playback clock is checked, in Hz
        #[arg(long, default_value_t = DEFAULT_LOOP_RATE)]
        loop_rate: f64,
        /// Ignore playback commands on stdin
        #[arg(long)]
        no_controls: bool,
    },
    /// Send a single image
    Send {
        /// Image to pack and send
        image: PathBuf,
    },
    /// Send a uniform frame
    Fill {
        /// All pixels on instead of off
        #[arg(long)]
        white: bool,
    },
    /// Pack images into a .bin frame file, no device needed
    Pack {
        /// Image directory or single image
        input: PathBuf,
        /// Output frame file
        output: PathBuf,
    },
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn load_with_progress(source: &Path) -> Result<Vec<Frame>> {
    println!("Loading frames from {:?}...", source);
    let pb = ProgressBar::new(0);
    pb.set_style(bar_style(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames",
    ));

    let frames = frames::load_source(source, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
    .with_context(|| format!("Failed to load frames from {:?}", source))?;

    pb.finish_and_clear();
    println!("Loaded {} frames ({} bytes each)", frames.len(), FRAME_BYTES);
    Ok(frames)
}

impl Cli {
    fn ack_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_ACK_TIMEOUT)
    }
}

async fn connect(cli: &Cli) -> Result<SerialConnection> {
    println!("Connecting to {} at {} baud...", cli.port, cli.baud);
    let connection = SerialConnection::open(&cli.port, cli.baud, cli.ack_timeout())
        .await
        .context("Failed to connect to device")?
        .with_settle(cli.settle);
    println!("Connected successfully!");
    Ok(connection)
}

const CONTROLS_HELP: &str =
    "Controls (then Enter): Enter/t toggle, p pause, play, r rewind, < > 5s, j l 10s, +N/-N seconds, \
     goto N, , . speed step, speed X, q stop";

/// Read playback commands from stdin lines on a dedicated thread
fn spawn_controls() -> mpsc::Receiver<PlayerCommand> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.parse::<PlayerCommand>() {
                Ok(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    });
    rx
}

fn report_ack(status: AckStatus) {
    match status {
        AckStatus::Acked => println!("✅ Frame acknowledged"),
        AckStatus::Unexpected(byte) => println!("⚠️  Unexpected reply 0x{:02X}", byte),
        AckStatus::TimedOut => println!("⚠️  No ack within timeout, receiver may have dropped the frame"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("Frame Streamer v0.1.0 ({}x{} monochrome)", FRAME_WIDTH, FRAME_HEIGHT);

    match &cli.command {
        Commands::Pack { input, output } => {
            let frames = load_with_progress(input)?;
            frames::write_frame_file(output, &frames)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!(
                "Wrote {} frames ({} bytes) to {:?}",
                frames.len(),
                frames.len() * FRAME_BYTES,
                output
            );
        }

        Commands::Send { image } => {
            let frame = frames::load_image(image)
                .with_context(|| format!("Failed to load image {:?}", image))?;
            println!("Packed {:?}: {} of {} pixels lit", image, frame.lit_pixels(), FRAME_WIDTH * FRAME_HEIGHT);

            let mut connection = connect(&cli).await?;
            report_ack(connection.send_frame(&frame).await?);
        }

        Commands::Fill { white } => {
            let mut connection = connect(&cli).await?;
            println!("Sending all-{} frame...", if *white { "white" } else { "black" });
            report_ack(connection.send_frame(&Frame::filled(*white)).await?);
        }

        Commands::Stream {
            source,
            fps,
            speed,
            start,
            looping,
            loop_rate,
            no_controls,
        } => {
            let frames = load_with_progress(source)?;
            let total = frames.len();

            let mut timeline = Timeline::new(total, *fps);
            timeline.set_speed(*speed);
            timeline.set_looping(*looping);
            timeline.seek(*start);
            let speed = timeline.speed();

            let connection = connect(&cli).await?;
            let mut player = Player::new(connection, frames, timeline).with_loop_rate(*loop_rate);
            if !*no_controls {
                player = player.with_commands(spawn_controls());
                println!("{}", CONTROLS_HELP);
            }

            let pb = ProgressBar::new(total as u64);
            pb.set_style(bar_style(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            ));

            println!(
                "Streaming {} frames at {} fps x{}{}",
                total,
                fps,
                speed,
                if *looping { " (looping, Ctrl-C to stop)" } else { "" }
            );

            let started = Instant::now();
            tokio::select! {
                result = player.run(&pb) => {
                    result?;
                    pb.finish_with_message("done");
                }
                _ = tokio::signal::ctrl_c() => {
                    pb.abandon_with_message("interrupted");
                }
            }

            let stats = player.stats();
            let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
            println!(
                "Sent {} frames in {}: {} acked, {} unexpected replies, {} timeouts",
                stats.sent,
                humantime::format_duration(elapsed),
                stats.acked,
                stats.unexpected,
                stats.timed_out
            );
        }
    }

    Ok(())
}
