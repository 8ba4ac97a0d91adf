//! Eye geometry on the iBUG 68-point landmark layout.
//!
//! See <https://ibug.doc.ic.ac.uk/resources/facial-point-annotations/> for the index convention and
//! Soukupová & Čech, "Real-Time Eye Blink Detection using Facial Landmarks" (CVWW 2016) for the ratio.

use std::ops::Range;

use nalgebra::distance;

use crate::error::{Error, Result};

pub type Point = nalgebra::Point2<f32>;

pub const NUM_LANDMARKS: usize = 68;

pub const JAW: Range<usize> = 0..17;
pub const RIGHT_EYEBROW: Range<usize> = 17..22;
pub const LEFT_EYEBROW: Range<usize> = 22..27;
pub const NOSE: Range<usize> = 27..36;
pub const RIGHT_EYE: Range<usize> = 36..42;
pub const LEFT_EYE: Range<usize> = 42..48;
pub const MOUTH: Range<usize> = 48..68;

/// Eye Aspect Ratio of a contour ordered outer corner, upper lid (2), inner corner, lower lid (2).
///
/// ```text
/// ear = (|p1 - p5| + |p2 - p4|) / (2 |p0 - p3|)
/// ```
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Result<f32> {
    let vertical_a = distance(&eye[1], &eye[5]);
    let vertical_b = distance(&eye[2], &eye[4]);
    let horizontal = distance(&eye[0], &eye[3]);

    if horizontal <= f32::EPSILON {
        return Err(Error::DegenerateLandmarks);
    }

    Ok((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// EAR of both eyes of one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeRatios {
    pub left: f32,
    pub right: f32,
}

impl EyeRatios {
    pub fn mean(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

/// The 68 landmarks of one face, snapped to the pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.len() != NUM_LANDMARKS {
            return Err(Error::LandmarkCount(points.len()));
        }

        Ok(Self {
            points: points
                .into_iter()
                .map(|p| Point::new(p.x.round(), p.y.round()))
                .collect(),
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn left_eye(&self) -> [Point; 6] {
        self.eye(LEFT_EYE)
    }

    pub fn right_eye(&self) -> [Point; 6] {
        self.eye(RIGHT_EYE)
    }

    fn eye(&self, range: Range<usize>) -> [Point; 6] {
        let start = range.start;
        std::array::from_fn(|i| self.points[start + i])
    }

    pub fn eye_ratios(&self) -> Result<EyeRatios> {
        Ok(EyeRatios {
            left: eye_aspect_ratio(&self.left_eye())?,
            right: eye_aspect_ratio(&self.right_eye())?,
        })
    }
}

/// Convex hull of points on the pixel grid (coordinates are rounded first).
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut grid: Vec<imageproc::point::Point<i32>> = points
        .iter()
        .map(|p| imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    grid.sort_by_key(|p| (p.x, p.y));
    grid.dedup();

    let hull = if grid.len() < 3 {
        grid
    } else {
        imageproc::geometry::convex_hull(grid)
    };

    hull.into_iter().map(|p| Point::new(p.x as f32, p.y as f32)).collect()
}
