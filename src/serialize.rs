//! Compact `bincode` mirror of a [`ShapePredictor`], much faster to load than dlib's varint format.

use serde::{Deserialize, Serialize};

use crate::predictor::{RegressionTree, Shape, ShapePredictor, SplitFeature, Vector2};

#[derive(Serialize, Deserialize)]
struct RegressionTreeSerialize {
    splits: Vec<SplitFeature>,
    leaf_values: Vec<Vec<f32>>,
}

impl RegressionTreeSerialize {
    fn from(tree: &RegressionTree) -> Self {
        Self {
            splits: tree.splits.clone(),
            leaf_values: tree.leaf_values.iter().map(|leaf| leaf.as_slice().to_vec()).collect(),
        }
    }

    fn into_tree(self) -> RegressionTree {
        RegressionTree {
            splits: self.splits,
            leaf_values: self.leaf_values.into_iter().map(Shape::from_vec).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ShapePredictorSerialize {
    initial_shape: Vec<f32>,
    forests: Vec<Vec<RegressionTreeSerialize>>,
    anchor_idx: Vec<Vec<u64>>,
    deltas: Vec<Vec<(f32, f32)>>,
}

impl ShapePredictorSerialize {
    pub fn from(predictor: &ShapePredictor) -> Self {
        Self {
            initial_shape: predictor.initial_shape.as_slice().to_vec(),
            forests: predictor
                .forests
                .iter()
                .map(|forest| forest.iter().map(RegressionTreeSerialize::from).collect())
                .collect(),
            anchor_idx: predictor
                .anchor_idx
                .iter()
                .map(|anchors| anchors.iter().map(|&a| a as u64).collect())
                .collect(),
            deltas: predictor
                .deltas
                .iter()
                .map(|deltas| deltas.iter().map(|d| (d.x, d.y)).collect())
                .collect(),
        }
    }

    pub fn into_predictor(self) -> ShapePredictor {
        ShapePredictor {
            initial_shape: Shape::from_vec(self.initial_shape),
            forests: self
                .forests
                .into_iter()
                .map(|forest| forest.into_iter().map(RegressionTreeSerialize::into_tree).collect())
                .collect(),
            anchor_idx: self
                .anchor_idx
                .into_iter()
                .map(|anchors| anchors.into_iter().map(|a| a as usize).collect())
                .collect(),
            deltas: self
                .deltas
                .into_iter()
                .map(|deltas| deltas.into_iter().map(|(x, y)| Vector2::new(x, y)).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::tests::tiny_predictor;
    use crate::predictor::Rectangle;
    use image::{GrayImage, Luma};

    #[test]
    fn cache_file_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.bin");
        let original = tiny_predictor();

        original.write(&path).unwrap();
        let restored = ShapePredictor::load(&path).unwrap();

        let image = GrayImage::from_fn(64, 64, |x, y| Luma([((x * 3 + y) % 256) as u8]));
        let region = Rectangle::new(8.0, 8.0, 40.0, 40.0);
        assert_eq!(original.run(&image, &region), restored.run(&image, &region));
    }

    #[test]
    fn corrupt_cache_is_a_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        assert!(matches!(
            ShapePredictor::load(&path),
            Err(crate::Error::ModelLoad { .. })
        ));
    }
}
