//! Detect eye blinks in a video or still image.
//!
//! Usage:
//!   detect-blinks -p shape_predictor_68_face_landmarks.dat -i face.jpg
//!   detect-blinks -p shape_predictor_68_face_landmarks.dat -v clip.mp4
//!   detect-blinks -p shape_predictor_68_face_landmarks.dat -v frames/ -o out/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blink_detection::source::{load_image, open_video};
use blink_detection::{
    DetectorConfig, DirectorySink, FrameSink, PipelineConfig, SeetaFaceDetector, Session, ShapePredictor,
};

#[derive(Parser, Debug)]
#[command(name = "detect-blinks", version, about = "Eye blink detection from facial landmarks")]
#[command(group(ArgGroup::new("input").required(true).multiple(true).args(["video", "image"])))]
struct Args {
    /// Path to the facial landmark predictor (.dat, .dat.bz2 or converted .bin)
    #[arg(short = 'p', long, value_name = "PATH")]
    shape_predictor: PathBuf,

    /// Path to an input video file, animated GIF or directory of frames
    #[arg(short, long, value_name = "PATH")]
    video: Option<PathBuf>,

    /// Path to an input image file
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Path to the SeetaFace frontal face detector model
    #[arg(long, value_name = "PATH", default_value = "seeta_fd_frontal_v1.0.bin")]
    face_detector: PathBuf,

    /// Minimum face size for detection
    #[arg(long, default_value_t = 20)]
    min_face_size: u32,

    /// EAR below which an eye counts as closed
    #[arg(long, default_value_t = blink_detection::tracker::DEFAULT_EAR_THRESHOLD)]
    ear_threshold: f32,

    /// Consecutive closed frames that make a blink
    #[arg(long, default_value_t = blink_detection::tracker::DEFAULT_CONSEC_FRAMES)]
    consec_frames: u32,

    /// Width frames are resized to before detection
    #[arg(long, default_value_t = blink_detection::frame::DEFAULT_TARGET_WIDTH)]
    width: u32,

    /// Key poll interval between video frames, in milliseconds
    #[arg(long, default_value_t = 10)]
    key_wait_ms: u64,

    /// Write annotated frames and the EAR plot to this directory instead of showing a window
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Increase log verbosity (-v is taken by --video)
    #[arg(long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            target_width: self.width,
            ear_threshold: self.ear_threshold,
            consec_frames: self.consec_frames,
            key_wait: Duration::from_millis(self.key_wait_ms),
            ..PipelineConfig::default()
        }
    }

    fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            min_face_size: self.min_face_size,
            ..DetectorConfig::default()
        }
    }
}

enum Input {
    Image(image::RgbImage),
    Video(Box<dyn blink_detection::FrameSource>),
}

/// The image path wins if it opens; an unreadable source is skipped in favour of the other one.
fn open_input(image: Option<&Path>, video: Option<&Path>) -> Result<Input> {
    let mut last_err = None;

    if let Some(path) = image {
        match load_image(path) {
            Ok(image) => return Ok(Input::Image(image)),
            Err(err) => {
                warn!("skipping image: {}", err);
                last_err = Some(err);
            }
        }
    }

    if let Some(path) = video {
        match open_video(path) {
            Ok(source) => return Ok(Input::Video(source)),
            Err(err) => {
                warn!("skipping video: {}", err);
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) => Err(anyhow::Error::new(err).context("no readable input")),
        None => bail!("no input given: pass --image or --video"),
    }
}

/// Directory used when the binary was built without a window system.
#[cfg(not(feature = "opencv"))]
const FALLBACK_OUTPUT_DIR: &str = "blink-output";

fn directory_sink(dir: &Path) -> Result<Box<dyn FrameSink>> {
    let sink = DirectorySink::create(dir).with_context(|| format!("creating output directory {}", dir.display()))?;
    info!("writing frames to {}", dir.display());
    Ok(Box::new(sink))
}

#[cfg(feature = "opencv")]
fn default_sink() -> Result<Box<dyn FrameSink>> {
    Ok(Box::new(blink_detection::HighGuiSink::new()))
}

#[cfg(not(feature = "opencv"))]
fn default_sink() -> Result<Box<dyn FrameSink>> {
    warn!("built without the `opencv` feature, so there is no window; pass --output-dir to choose where frames go");
    directory_sink(Path::new(FALLBACK_OUTPUT_DIR))
}

fn run(args: &Args) -> Result<()> {
    let predictor = ShapePredictor::load_face_landmarks(&args.shape_predictor)
        .with_context(|| format!("loading facial landmark predictor {}", args.shape_predictor.display()))?;
    let detector =
        SeetaFaceDetector::load(&args.face_detector, &args.detector_config()).context("loading face detector")?;

    let input = open_input(args.image.as_deref(), args.video.as_deref())?;

    let mut sink = match &args.output_dir {
        Some(dir) => directory_sink(dir)?,
        None => default_sink()?,
    };
    let mut session = Session::new(detector, predictor, args.pipeline_config());

    match input {
        Input::Image(image) => {
            info!("running on still image");
            session.run_image(&image, &mut sink)?;
        }
        Input::Video(source) => {
            info!("starting video stream");
            let summary = session.run_video(source, &mut sink)?;
            println!("Blinks: {} over {} frames", summary.total_blinks, summary.frames);
        }
    }

    Ok(())
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::ExitCode::FAILURE
        }
    }
}
