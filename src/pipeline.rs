//! The per-frame blink detection pipeline and the still image / video drivers around it.

use std::time::Duration;

use image::{GrayImage, RgbImage};
use tracing::{debug, info};

use crate::annotate::{self, ear_label};
use crate::detector::{FaceDetector, LandmarkRegressor};
use crate::error::Result;
use crate::frame::{grayscale, resize_to_width, DEFAULT_TARGET_WIDTH};
use crate::geometry::{EyeRatios, LandmarkSet};
use crate::plot::{render_plot, EarSeries, DEFAULT_PLOT_SIZE};
use crate::predictor::Rectangle;
use crate::sink::{FrameSink, Key, KeyWait};
use crate::source::FrameSource;
use crate::tracker::{BlinkTracker, DEFAULT_CONSEC_FRAMES, DEFAULT_EAR_THRESHOLD};

pub const FRAME_WINDOW: &str = "Frame";
pub const PLOT_WINDOW: &str = "EAR";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub target_width: u32,
    pub ear_threshold: f32,
    pub consec_frames: u32,
    /// Key poll between video frames; doubles as the frame rate throttle.
    pub key_wait: Duration,
    pub plot_size: (u32, u32),
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            consec_frames: DEFAULT_CONSEC_FRAMES,
            key_wait: Duration::from_millis(10),
            plot_size: DEFAULT_PLOT_SIZE,
        }
    }
}

/// One face in one frame.
#[derive(Debug, Clone)]
pub struct FaceObservation {
    pub region: Rectangle,
    pub landmarks: LandmarkSet,
    pub ratios: EyeRatios,
}

impl FaceObservation {
    pub fn ear(&self) -> f32 {
        self.ratios.mean()
    }
}

/// A resized frame and the faces found in it.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub frame: RgbImage,
    pub faces: Vec<FaceObservation>,
}

impl FrameAnalysis {
    /// The face that drives blink tracking: the largest one.
    pub fn tracked_face(&self) -> Option<&FaceObservation> {
        self.faces.iter().max_by(|a, b| a.region.area().total_cmp(&b.region.area()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSummary {
    pub frames: usize,
    pub total_blinks: u32,
    pub cancelled: bool,
    pub ear_series: EarSeries,
}

/// Detector, regressor and blink state for one run.
pub struct Session<D, R> {
    detector: D,
    regressor: R,
    config: PipelineConfig,
    tracker: BlinkTracker,
    ear_series: EarSeries,
}

impl<D: FaceDetector, R: LandmarkRegressor> Session<D, R> {
    pub fn new(detector: D, regressor: R, config: PipelineConfig) -> Self {
        Self {
            detector,
            regressor,
            tracker: BlinkTracker::new(config.ear_threshold, config.consec_frames),
            ear_series: EarSeries::default(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &BlinkTracker {
        &self.tracker
    }

    pub fn ear_series(&self) -> &EarSeries {
        &self.ear_series
    }

    /// Resize, detect and measure every face. Leaves the blink state alone.
    pub fn analyze(&mut self, frame: &RgbImage) -> FrameAnalysis {
        let frame = resize_to_width(frame, self.config.target_width);
        let gray = grayscale(&frame);

        let faces = self
            .detector
            .detect_faces(&gray)
            .into_iter()
            .filter_map(|region| self.observe_face(&gray, region))
            .collect();

        FrameAnalysis { frame, faces }
    }

    fn observe_face(&self, gray: &GrayImage, region: Rectangle) -> Option<FaceObservation> {
        let landmarks = match LandmarkSet::new(self.regressor.locate_landmarks(gray, &region)) {
            Ok(landmarks) => landmarks,
            Err(err) => {
                debug!(?region, "skipping face: {}", err);
                return None;
            }
        };

        match landmarks.eye_ratios() {
            Ok(ratios) => Some(FaceObservation {
                region,
                landmarks,
                ratios,
            }),
            Err(err) => {
                debug!(?region, "skipping face: {}", err);
                None
            }
        }
    }

    /// Annotate a still image: eye hulls and an EAR label above each face.
    pub fn process_image(&mut self, image: &RgbImage) -> RgbImage {
        let FrameAnalysis { mut frame, faces } = self.analyze(image);

        for face in &faces {
            draw_eyes(&mut frame, face);
            let label_y = (face.region.y as i32 - 10).max(annotate::TEXT_SCALE as i32 * 7);
            annotate::draw_label(&mut frame, &ear_label(face.ear()), face.region.x as i32, label_y);
        }

        info!(faces = faces.len(), "image processed");
        frame
    }

    /// Run one video frame through the pipeline, update the blink state and annotate it.
    pub fn process_video_frame(&mut self, frame: &RgbImage) -> RgbImage {
        let analysis = self.analyze(frame);
        let tracked = analysis.tracked_face().map(|face| face.ear());
        let FrameAnalysis { mut frame, faces } = analysis;

        for face in &faces {
            draw_eyes(&mut frame, face);
        }

        if let Some(ear) = tracked {
            self.tracker.update(ear);
            annotate::draw_video_labels(&mut frame, self.tracker.total_blinks(), ear);
        }

        debug!(frame = self.ear_series.len(), faces = faces.len(), ear = ?tracked, "video frame");
        self.ear_series.push(tracked);
        frame
    }

    /// Show one annotated image and block until a key is pressed.
    pub fn run_image<K: FrameSink>(&mut self, image: &RgbImage, sink: &mut K) -> Result<()> {
        let annotated = self.process_image(image);
        sink.show(FRAME_WINDOW, &annotated)?;
        sink.wait_key(KeyWait::Forever)?;
        Ok(())
    }

    /// Consume `source` until it runs dry or the sink reports Escape, then show the EAR plot.
    ///
    /// The source is dropped before the plot is rendered, releasing the capture.
    pub fn run_video<S: FrameSource, K: FrameSink>(&mut self, mut source: S, sink: &mut K) -> Result<VideoSummary> {
        let mut cancelled = false;

        while let Some(frame) = source.next_frame()? {
            let annotated = self.process_video_frame(&frame);
            sink.show(FRAME_WINDOW, &annotated)?;

            if sink.wait_key(KeyWait::For(self.config.key_wait))? == Some(Key::Escape) {
                info!("cancelled");
                cancelled = true;
                break;
            }
        }
        drop(source);

        let pending = self.tracker.pending_closed_frames();
        if pending > 0 {
            info!(pending, "stream ended with eyes closed; that closure is not counted");
        }

        let (width, height) = self.config.plot_size;
        let plot = render_plot(&self.ear_series, self.tracker.threshold(), width, height);
        sink.show(PLOT_WINDOW, &plot)?;
        sink.wait_key(KeyWait::Forever)?;

        let summary = VideoSummary {
            frames: self.ear_series.len(),
            total_blinks: self.tracker.total_blinks(),
            cancelled,
            ear_series: self.ear_series.clone(),
        };
        info!(frames = summary.frames, blinks = summary.total_blinks, "video finished");
        Ok(summary)
    }
}

fn draw_eyes(frame: &mut RgbImage, face: &FaceObservation) {
    annotate::draw_eye_contour(frame, &face.landmarks.left_eye());
    annotate::draw_eye_contour(frame, &face.landmarks.right_eye());
}
