//! Eye blink detection from facial landmarks.
//!
//! Faces are found by a [`FaceDetector`], 68 landmarks are placed in each face by a
//! [`LandmarkRegressor`] (normally a dlib [`ShapePredictor`]), and the Eye Aspect Ratio of the two eye
//! contours is thresholded by a [`BlinkTracker`]. [`Session`] ties the pieces together for a still
//! image or a stream of frames.
//!
//! The `opencv` feature adds video file decoding and an on-screen window sink.

pub mod annotate;
#[cfg(feature = "opencv")]
mod cv;
pub mod detector;
mod dlib_parser;
mod error;
pub mod font;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod plot;
pub mod predictor;
mod serialize;
pub mod sink;
pub mod source;
pub mod tracker;
mod transformations;

pub use detector::{DetectorConfig, FaceDetector, LandmarkRegressor, SeetaFaceDetector};
pub use error::{Error, Result};
pub use geometry::{eye_aspect_ratio, LandmarkSet, Point};
pub use pipeline::{FaceObservation, FrameAnalysis, PipelineConfig, Session, VideoSummary};
pub use plot::EarSeries;
pub use predictor::{Rectangle, ShapePredictor, Vector2};
pub use sink::{DirectorySink, FrameSink, Key, KeyWait};
#[cfg(feature = "opencv")]
pub use sink::HighGuiSink;
pub use source::FrameSource;
#[cfg(feature = "opencv")]
pub use source::VideoCaptureSource;
pub use tracker::BlinkTracker;
