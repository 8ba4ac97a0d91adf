//! Evaluation of dlib `shape_predictor` models (an ensemble of regression trees, Kazemi & Sullivan 2014).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use image::{GenericImageView, Pixel};
use nalgebra::DVector;
use num_traits::NumCast;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detector::LandmarkRegressor;
use crate::dlib_parser;
use crate::error::{Error, Result};
use crate::geometry::{Point, NUM_LANDMARKS};
use crate::serialize::ShapePredictorSerialize;
use crate::transformations::PointTransformationAffine;

pub type Vector2 = nalgebra::Vector2<f32>;

/// Landmark coordinates packed as `[x0, y0, x1, y1, ...]` in normalised face space.
pub(crate) type Shape = DVector<f32>;

fn pixel_intensity<I: GenericImageView>(image: &I, x: u32, y: u32) -> f32 {
    let luma = image.get_pixel(x, y).to_luma();
    NumCast::from(luma.channels()[0]).unwrap_or(0.0)
}

fn location(shape: &Shape, idx: usize) -> Vector2 {
    debug_assert!(idx < shape.len() / 2);
    Vector2::new(shape[idx * 2], shape[idx * 2 + 1])
}

pub struct ShapePredictor {
    pub(crate) initial_shape: Shape,
    pub(crate) forests: Vec<Vec<RegressionTree>>,
    pub(crate) anchor_idx: Vec<Vec<usize>>,
    pub(crate) deltas: Vec<Vec<Vector2>>,
}

impl ShapePredictor {
    /// Load a model, picking the decoder from the file name: `.bin` is the bincode cache written by
    /// [`ShapePredictor::write`], `.bz2` is a compressed dlib model, anything else is a raw dlib model.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("loading facial landmark predictor from {}", path.display());

        let extension = path.extension().and_then(|ext| ext.to_str());
        let predictor = match extension {
            Some("bin") => Self::read(path),
            Some("bz2") => File::open(path)
                .map_err(Error::from)
                .and_then(|file| Self::read_from_dlib_reader(BzDecoder::new(BufReader::new(file)))),
            _ => Self::read_from_dlib(path),
        }
        .map_err(|err| match err {
            err @ Error::ModelLoad { .. } => err,
            other => Error::model_load(path, other),
        })?;

        debug!(
            landmarks = predictor.num_landmarks(),
            cascades = predictor.forests.len(),
            "landmark predictor ready"
        );
        Ok(predictor)
    }

    /// [`ShapePredictor::load`] a model and require the 68-point face layout the eye geometry expects.
    pub fn load_face_landmarks<P: AsRef<Path>>(path: P) -> Result<Self> {
        let predictor = Self::load(path)?;
        match predictor.num_landmarks() {
            NUM_LANDMARKS => Ok(predictor),
            other => Err(Error::LandmarkCount(other)),
        }
    }

    /// Deserialize the shape predictor from a file encoded by dlib.
    pub fn read_from_dlib<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_from_dlib_reader(BufReader::new(File::open(path)?))
    }

    pub fn read_from_dlib_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let predictor = dlib_parser::parse_shape_predictor(&buffer)?;
        predictor.validate()?;
        Ok(predictor)
    }

    /// Serialize the shape predictor to a file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &ShapePredictorSerialize::from(self))?;
        Ok(())
    }

    /// Deserialize the shape predictor from a file written by [`ShapePredictor::write`].
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let serialized: ShapePredictorSerialize = bincode::deserialize_from(reader)?;
        let predictor = serialized.into_predictor();
        predictor.validate()?;
        Ok(predictor)
    }

    pub fn num_landmarks(&self) -> usize {
        self.initial_shape.len() / 2
    }

    // https://github.com/davisking/dlib/blob/master/dlib/image_processing/shape_predictor.h#L339
    /// Run the shape predictor on an image with a specific region of interest and get the positions of landmarks.
    pub fn run<I: GenericImageView>(&self, image: &I, region: &Rectangle) -> Vec<Vector2> {
        let mut current_shape = self.initial_shape.clone();
        let mut feature_pixel_values = Vec::new();
        let tform_to_img = PointTransformationAffine::unnormalising(region);

        for (cascade, forest) in self.forests.iter().enumerate() {
            self.extract_feature_pixel_values(
                image,
                &tform_to_img,
                &current_shape,
                cascade,
                &mut feature_pixel_values,
            );

            for tree in forest {
                current_shape += tree.find(&feature_pixel_values);
            }
        }

        (0..self.num_landmarks())
            .map(|i| tform_to_img.apply(location(&current_shape, i)))
            .collect()
    }

    fn extract_feature_pixel_values<I: GenericImageView>(
        &self,
        image: &I,
        tform_to_img: &PointTransformationAffine,
        current_shape: &Shape,
        cascade: usize,
        feature_pixel_values: &mut Vec<f32>,
    ) {
        let anchors = &self.anchor_idx[cascade];
        let deltas = &self.deltas[cascade];
        debug_assert_eq!(anchors.len(), deltas.len());

        let tform = self.find_tform_between(current_shape).m;
        let (width, height) = image.dimensions();

        feature_pixel_values.clear();
        feature_pixel_values.extend(anchors.iter().zip(deltas).map(|(&anchor, delta)| {
            let point = tform_to_img.apply(tform * delta + location(current_shape, anchor));
            let (x, y) = (point.x.round(), point.y.round());

            if x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32 {
                pixel_intensity(image, x as u32, y as u32)
            } else {
                0.0
            }
        }));
    }

    fn find_tform_between(&self, to_shape: &Shape) -> PointTransformationAffine {
        debug_assert_eq!(self.initial_shape.len(), to_shape.len());

        let num = self.num_landmarks();

        if num == 1 {
            PointTransformationAffine::default()
        } else {
            let from_points: Vec<Vector2> = (0..num).map(|i| location(&self.initial_shape, i)).collect();
            let to_points: Vec<Vector2> = (0..num).map(|i| location(to_shape, i)).collect();

            PointTransformationAffine::find_similarity(&from_points, &to_points)
        }
    }

    /// Reject models whose indices would panic during evaluation.
    fn validate(&self) -> Result<()> {
        let shape_len = self.initial_shape.len();
        let invalid = |reason: String| Err(Error::ModelParse(reason));

        if shape_len == 0 || shape_len % 2 != 0 {
            return invalid(format!("initial shape has {} coordinates", shape_len));
        }
        if self.forests.len() != self.anchor_idx.len() || self.forests.len() != self.deltas.len() {
            return invalid(format!(
                "{} cascades but {} anchor sets and {} delta sets",
                self.forests.len(),
                self.anchor_idx.len(),
                self.deltas.len()
            ));
        }

        for ((forest, anchors), deltas) in self.forests.iter().zip(&self.anchor_idx).zip(&self.deltas) {
            if anchors.len() != deltas.len() {
                return invalid(format!("{} anchors but {} deltas", anchors.len(), deltas.len()));
            }
            if let Some(&anchor) = anchors.iter().find(|&&anchor| anchor >= shape_len / 2) {
                return invalid(format!("anchor {} out of range", anchor));
            }
            for tree in forest {
                tree.validate(deltas.len(), shape_len)?;
            }
        }

        Ok(())
    }
}

impl LandmarkRegressor for ShapePredictor {
    fn locate_landmarks(&self, gray: &image::GrayImage, region: &Rectangle) -> Vec<Point> {
        self.run(gray, region)
            .into_iter()
            .map(|v| Point::new(v.x, v.y))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct SplitFeature {
    pub idx1: usize,
    pub idx2: usize,
    pub thresh: f32,
}

/// A complete binary tree stored breadth-first: node `i` has children `2i + 1` and `2i + 2`.
pub(crate) struct RegressionTree {
    pub splits: Vec<SplitFeature>,
    pub leaf_values: Vec<Shape>,
}

impl RegressionTree {
    pub fn find(&self, feature_pixel_values: &[f32]) -> &Shape {
        debug_assert_eq!(self.leaf_values.len(), self.splits.len() + 1);

        let mut i = 0;

        while i < self.splits.len() {
            let split = &self.splits[i];
            if feature_pixel_values[split.idx1] - feature_pixel_values[split.idx2] > split.thresh {
                i = 2 * i + 1;
            } else {
                i = 2 * i + 2;
            }
        }

        &self.leaf_values[i - self.splits.len()]
    }

    fn validate(&self, num_features: usize, shape_len: usize) -> Result<()> {
        if self.leaf_values.len() != self.splits.len() + 1 {
            return Err(Error::ModelParse(format!(
                "tree has {} splits but {} leaves",
                self.splits.len(),
                self.leaf_values.len()
            )));
        }
        if self.splits.iter().any(|s| s.idx1 >= num_features || s.idx2 >= num_features) {
            return Err(Error::ModelParse("split feature index out of range".to_string()));
        }
        if self.leaf_values.iter().any(|leaf| leaf.len() != shape_len) {
            return Err(Error::ModelParse("leaf value does not match shape size".to_string()));
        }
        Ok(())
    }
}

/// A rectangle in the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn tl_corner(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }

    pub fn tr_corner(&self) -> Vector2 {
        Vector2::new(self.x + self.width, self.y)
    }

    pub fn br_corner(&self) -> Vector2 {
        Vector2::new(self.x + self.width, self.y + self.height)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}
