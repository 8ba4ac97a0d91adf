use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("malformed dlib shape predictor: {0}")]
    ModelParse(String),

    #[error("unsupported shape predictor version {0} (expected 1)")]
    UnsupportedVersion(i64),

    #[error("cannot open source {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("eye contour has zero width")]
    DegenerateLandmarks,

    #[error("expected 68 landmarks, got {0}")]
    LandmarkCount(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("model serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("unsupported video frame: {0}")]
    Frame(String),

    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

impl Error {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn source_unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
