mod record;

use log::*;
use marker_anchor::{
    Anchor, AnchorSink, DecodeGate, Detection, FramePipeline, MarkerDecoder, PipelineError,
    PipelineOutcome, PipelineSettings,
};
use record::{AnchorRecord, RecordedFrame};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use thiserror::Error;

#[derive(StructOpt, Clone)]
#[structopt(
    name = "anchor-sandbox",
    about = "Replays recorded marker detections through the anchoring pipeline"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `marker_anchor::PipelineSettings`. Missing fields take their
    /// defaults and a missing file means all defaults.
    #[structopt(short, long, default_value = "anchor-settings.json")]
    settings: PathBuf,
    /// Override the physical marker size in meters
    #[structopt(long)]
    marker_size: Option<f64>,
    /// Start a new scan session every time an anchor is placed
    #[structopt(long)]
    rescan: bool,
    /// Submit frames to the worker pool in real time instead of replaying them in order
    #[structopt(long)]
    threaded: bool,
    /// JSON lines recording, one `RecordedFrame` per line
    #[structopt(parse(from_os_str))]
    recording: PathBuf,
}

#[derive(Debug, Error)]
enum ReplayError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line} of the recording is not a frame: {source}")]
    Frame {
        line: usize,
        source: serde_json::Error,
    },
    #[error("settings file is invalid: {0}")]
    Settings(serde_json::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// The recording already contains the decoder output.
struct Replay;

impl MarkerDecoder for Replay {
    type Image = Option<Detection>;

    fn decode(&self, image: &Self::Image) -> Option<Detection> {
        image.clone()
    }
}

/// Prints every anchor as a JSON line on stdout.
struct PrintSink;

impl AnchorSink for PrintSink {
    fn place(&self, anchor: &Anchor) -> bool {
        match serde_json::to_string(&AnchorRecord::from(anchor)) {
            Ok(line) => {
                println!("{}", line);
                true
            }
            Err(e) => {
                error!("failed to serialize anchor: {}", e);
                false
            }
        }
    }
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(&opt) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(opt: &Opt) -> Result<(), ReplayError> {
    let mut settings = load_settings(&opt.settings)?;
    if let Some(marker_size) = opt.marker_size {
        settings.solver.marker_size = marker_size;
    }
    let frames = load_recording(&opt.recording)?;
    info!("loaded {} frames", frames.len());

    let pipeline = FramePipeline::new(settings, Replay, PrintSink)?;
    if opt.threaded {
        replay_threaded(&pipeline, frames);
    } else {
        replay_in_order(&pipeline, frames, opt.rescan);
    }
    Ok(())
}

fn load_settings(path: &Path) -> Result<PipelineSettings, ReplayError> {
    match std::fs::File::open(path) {
        Ok(file) => {
            let settings = serde_json::from_reader(BufReader::new(file)).map_err(ReplayError::Settings)?;
            info!("loaded settings from {}", path.display());
            Ok(settings)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no settings at {}, using defaults", path.display());
            Ok(PipelineSettings::default())
        }
        Err(source) => Err(ReplayError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn load_recording(path: &Path) -> Result<Vec<RecordedFrame>, ReplayError> {
    let io_error = |source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_error)?;
    let mut frames = vec![];
    for (ix, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let frame = serde_json::from_str(&line).map_err(|source| ReplayError::Frame {
            line: ix + 1,
            source,
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Runs every frame on this thread, still honoring the decode interval in recording time.
fn replay_in_order(pipeline: &FramePipeline<Replay, PrintSink>, frames: Vec<RecordedFrame>, rescan: bool) {
    let start = Instant::now();
    let gate = Arc::new(DecodeGate::new(pipeline.settings().min_decode_interval()));
    let mut generation = pipeline.session().begin();
    let (mut dropped, mut failed) = (0usize, 0usize);

    for recorded in frames {
        let frame = recorded.into_frame(start);
        let permit = match gate.try_acquire(frame.timestamp) {
            Some(permit) => permit,
            None => {
                dropped += 1;
                continue;
            }
        };

        match pipeline.process_frame(&frame, generation) {
            PipelineOutcome::Anchored(anchor) => {
                info!("placed {:?} ({:?})", anchor.payload, anchor.stability);
                if rescan {
                    generation = pipeline.rescan();
                }
            }
            PipelineOutcome::Failed(e) => {
                failed += 1;
                debug!("frame failed: {}", e);
            }
            PipelineOutcome::AlreadyAnchored => dropped += 1,
            outcome => trace!("{:?}", outcome),
        }
        permit.finish(frame.timestamp);
    }
    info!("dropped {} frames, {} failed", dropped, failed);
}

/// Feeds frames to the worker pool at the pace they were recorded.
fn replay_threaded(pipeline: &Arc<FramePipeline<Replay, PrintSink>>, frames: Vec<RecordedFrame>) {
    let start = Instant::now();
    let mut submitted = 0usize;
    for recorded in frames {
        let frame = recorded.into_frame(start);
        if let Some(wait) = frame.timestamp.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
        if pipeline.submit_frame(frame) {
            submitted += 1;
        }
    }
    // Let the last decode finish.
    std::thread::sleep(Duration::from_millis(500));
    info!("submitted {} frames to the decoder", submitted);
}
