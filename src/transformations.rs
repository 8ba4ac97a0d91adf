use nalgebra::{Matrix2, Matrix2x3, Matrix3, Vector3};

use crate::predictor::{Rectangle, Vector2};

/// A 2D affine map `p -> m * p + b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointTransformationAffine {
    pub m: Matrix2<f32>,
    pub b: Vector2,
}

impl Default for PointTransformationAffine {
    fn default() -> Self {
        Self::new(Matrix2::identity(), Vector2::zeros())
    }
}

impl PointTransformationAffine {
    pub fn new(m: Matrix2<f32>, b: Vector2) -> Self {
        Self { m, b }
    }

    pub fn apply(&self, p: Vector2) -> Vector2 {
        self.m * p + self.b
    }

    /// Maps the unit square onto `rectangle`, the space shape predictor models are trained in.
    pub fn unnormalising(rectangle: &Rectangle) -> Self {
        Self::find_affine(
            &[
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(1.0, 1.0),
            ],
            &[
                rectangle.tl_corner(),
                rectangle.tr_corner(),
                rectangle.br_corner(),
            ],
        )
    }

    /// Least-squares affine fit `to ~ m * from + b`.
    pub fn find_affine(from_points: &[Vector2], to_points: &[Vector2]) -> Self {
        debug_assert_eq!(from_points.len(), to_points.len());
        debug_assert!(from_points.len() >= 3);

        // Normal equations of the homogeneous system: M = Q P^T (P P^T)^+
        let mut ppt = Matrix3::zeros();
        let mut qpt = Matrix2x3::zeros();

        for (from, to) in from_points.iter().zip(to_points) {
            let p = Vector3::new(from.x, from.y, 1.0);
            ppt += p * p.transpose();
            qpt += to * p.transpose();
        }

        let pinv = ppt.pseudo_inverse(f32::EPSILON).unwrap_or_else(|_| Matrix3::zeros());
        let m: Matrix2x3<f32> = qpt * pinv;

        Self::new(
            m.fixed_view::<2, 2>(0, 0).into_owned(),
            m.column(2).into_owned(),
        )
    }

    /// Least-squares similarity (rotation, uniform scale, translation) fit, after Umeyama.
    pub fn find_similarity(from_points: &[Vector2], to_points: &[Vector2]) -> Self {
        debug_assert_eq!(from_points.len(), to_points.len());

        if from_points.is_empty() {
            return Self::default();
        }

        let n = from_points.len() as f32;

        let mean_from = from_points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;
        let mean_to = to_points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;

        let mut sigma_from = 0.0;
        let mut cov = Matrix2::zeros();

        for (from, to) in from_points.iter().zip(to_points) {
            let centred_from = from - mean_from;
            sigma_from += centred_from.norm_squared();
            cov += (to - mean_to) * centred_from.transpose();
        }

        sigma_from /= n;
        cov /= n;

        let svd = cov.svd(true, true);
        let d = Matrix2::from_diagonal(&svd.singular_values);
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => return Self::default(),
        };

        let mut s = Matrix2::identity();
        let det = cov.determinant();

        if det < 0.0 || (det == 0.0 && u.determinant() * v_t.determinant() < 0.0) {
            if d[(1, 1)] < d[(0, 0)] {
                s[(1, 1)] = -1.0;
            } else {
                s[(0, 0)] = -1.0;
            }
        }

        let r = u * s * v_t;

        let c = if sigma_from == 0.0 {
            1.0
        } else {
            (d * s).trace() / sigma_from
        };

        let t = mean_to - c * r * mean_from;

        Self::new(c * r, t)
    }
}
