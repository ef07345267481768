//! Replays a recorded detection log through the tracking pipeline.
//!
//! Each input line is one frame:
//!
//! ```json
//! {"frame": 12, "delta_angle": -1.5, "detections": [{"x": 100, "y": 220, "width": 64, "height": 90}]}
//! ```

use std::convert::Infallible;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use bintrack_rs::integration::{DetectionBuilder, MemoryPublisher, VISION_ARRAY_KEY};
use bintrack_rs::settings::DetectParams;
use bintrack_rs::source::ImageSource;
use bintrack_rs::{Detection, Detector, Direction, Frame, VisionConfig, VisionPipeline};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bintrack-replay")]
#[command(about = "Replay a recorded detection log through the bin tracker")]
#[command(version)]
struct Cli {
    /// JSON-lines detection log.
    #[arg(long)]
    input: PathBuf,

    /// Vision configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame width the log was recorded at.
    #[arg(long, default_value = "640")]
    width: usize,

    /// Frame height the log was recorded at.
    #[arg(long, default_value = "480")]
    height: usize,

    /// Publish per-strip Bin1..Bin4 flags instead of the track array.
    #[arg(long)]
    driver_station: bool,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    #[serde(default)]
    frame: Option<u64>,
    #[serde(default)]
    delta_angle: f64,
    #[serde(default)]
    detections: Vec<LoggedBox>,
}

#[derive(Debug, Deserialize)]
struct LoggedBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    #[serde(default)]
    direction: Direction,
}

/// Hands the pipeline whatever the current log line recorded.
#[derive(Default)]
struct ReplayDetector {
    pending: Vec<Detection>,
}

impl ReplayDetector {
    fn load(&mut self, boxes: &[LoggedBox]) {
        self.pending.clear();
        for b in boxes {
            match DetectionBuilder::new()
                .tlwh(b.x, b.y, b.width, b.height)
                .direction(b.direction)
                .try_build()
            {
                Ok(det) => self.pending.push(det),
                Err(e) => warn!(%e, "skipping logged box"),
            }
        }
    }
}

impl Detector for ReplayDetector {
    type Error = Infallible;

    fn detect(&mut self, _frame: &Frame, _params: &DetectParams) -> Result<Vec<Detection>, Self::Error> {
        Ok(std::mem::take(&mut self.pending))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VisionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VisionConfig::default(),
    };
    config = config.with_frame_width(cli.width);
    config.publish.driver_station |= cli.driver_station;

    if config.settings_path.is_some() {
        let tuning = config.camera_tuning().context("loading camera settings")?;
        info!(?tuning, "camera tuning");
    }

    let log = File::open(&cli.input)
        .with_context(|| format!("opening {}", cli.input.display()))?;

    let mut pipeline = VisionPipeline::new(
        ImageSource::blank(cli.width, cli.height),
        ReplayDetector::default(),
        MemoryPublisher::new(),
        config,
    )
    .context("invalid configuration")?;

    info!(input = %cli.input.display(), width = cli.width, height = cli.height, "replaying");

    let mut frames = 0usize;
    for (line_no, line) in BufReader::new(log).lines().enumerate() {
        let line = line.context("reading log")?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LogEntry = serde_json::from_str(&line)
            .with_context(|| format!("parsing line {}", line_no + 1))?;

        pipeline.detector_mut().load(&entry.detections);
        let Some(report) = pipeline.run_once(entry.delta_angle)? else {
            break;
        };
        frames += 1;

        let frame = entry.frame.unwrap_or(line_no as u64);
        match report.bins {
            Some(bins) => info!(frame, ?bins, "published bins"),
            None => info!(
                frame,
                tracks = report.vision_array.filled(),
                values = ?pipeline.publisher().number_array(VISION_ARRAY_KEY),
                "published track array"
            ),
        }
    }

    let summary = serde_json::to_string_pretty(&pipeline.tracker().display())?;
    println!("{summary}");
    info!(frames, tracks = pipeline.tracker().len(), "replay finished");
    Ok(())
}
