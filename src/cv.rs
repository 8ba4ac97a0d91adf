//! Conversions between OpenCV's BGR `Mat` and `image`'s RGB buffers.

use image::RgbImage;
use opencv::core::{self, Mat, Scalar};
use opencv::prelude::*;

use crate::error::{Error, Result};

/// Copy an 8-bit BGR frame into an RGB image. The image takes the frame's own dimensions.
pub(crate) fn mat_to_rgb(frame: &Mat) -> Result<RgbImage> {
    if frame.typ() != core::CV_8UC3 {
        return Err(Error::Frame(format!("expected 8-bit BGR, got Mat type {}", frame.typ())));
    }

    let owned;
    let frame = if frame.is_continuous() {
        frame
    } else {
        owned = frame.try_clone()?;
        &owned
    };

    let (width, height) = (frame.cols() as u32, frame.rows() as u32);
    let data = frame
        .data_bytes()?
        .chunks_exact(3)
        .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
        .collect();

    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| Error::Frame(format!("{}x{} frame has a short buffer", width, height)))
}

pub(crate) fn rgb_to_mat(image: &RgbImage) -> Result<Mat> {
    let (width, height) = image.dimensions();
    let mut mat = Mat::new_rows_cols_with_default(height as i32, width as i32, core::CV_8UC3, Scalar::all(0.0))?;

    for (bgr, rgb) in mat.data_bytes_mut()?.chunks_exact_mut(3).zip(image.as_raw().chunks_exact(3)) {
        bgr.copy_from_slice(&[rgb[2], rgb[1], rgb[0]]);
    }
    Ok(mat)
}
