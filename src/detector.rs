//! The two pretrained collaborators of the pipeline, behind capability traits.

use std::path::Path;

use image::GrayImage;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::predictor::Rectangle;

/// Finds face regions in a grayscale frame.
pub trait FaceDetector {
    fn detect_faces(&mut self, gray: &GrayImage) -> Vec<Rectangle>;
}

/// Regresses ordered facial landmarks inside a face region.
pub trait LandmarkRegressor {
    fn locate_landmarks(&self, gray: &GrayImage, region: &Rectangle) -> Vec<Point>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect_faces(&mut self, gray: &GrayImage) -> Vec<Rectangle> {
        (**self).detect_faces(gray)
    }
}

impl<R: LandmarkRegressor + ?Sized> LandmarkRegressor for Box<R> {
    fn locate_landmarks(&self, gray: &GrayImage, region: &Rectangle) -> Vec<Point> {
        (**self).locate_landmarks(gray, region)
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub min_face_size: u32,
    pub score_thresh: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: (u32, u32),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_face_size: 20,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: (4, 4),
        }
    }
}

/// SeetaFace frontal face detector from `rustface`.
pub struct SeetaFaceDetector {
    inner: Box<dyn rustface::Detector>,
}

impl SeetaFaceDetector {
    pub fn load<P: AsRef<Path>>(path: P, config: &DetectorConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("loading face detector from {}", path.display());

        let path_str = path
            .to_str()
            .ok_or_else(|| Error::model_load(path, "path is not valid UTF-8"))?;
        let mut inner = rustface::create_detector(path_str).map_err(|err| Error::model_load(path, err))?;

        inner.set_min_face_size(config.min_face_size);
        inner.set_score_thresh(config.score_thresh);
        inner.set_pyramid_scale_factor(config.pyramid_scale_factor);
        inner.set_slide_window_step(config.slide_window_step.0, config.slide_window_step.1);

        Ok(Self { inner })
    }
}

impl FaceDetector for SeetaFaceDetector {
    fn detect_faces(&mut self, gray: &GrayImage) -> Vec<Rectangle> {
        let (width, height) = gray.dimensions();
        let data = rustface::ImageData::new(gray.as_raw(), width, height);

        let faces: Vec<Rectangle> = self
            .inner
            .detect(&data)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Rectangle::new(bbox.x() as f32, bbox.y() as f32, bbox.width() as f32, bbox.height() as f32)
            })
            .collect();

        debug!(faces = faces.len(), "face detection");
        faces
    }
}
