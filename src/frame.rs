use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

pub const DEFAULT_TARGET_WIDTH: u32 = 1200;

/// Dimensions after scaling `width` to `target_width`: `round(height * target_width / width)`, at least 1.
pub fn scaled_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if width == 0 {
        return (target_width, height);
    }

    let scaled = (f64::from(height) * f64::from(target_width) / f64::from(width)).round() as u32;
    (target_width, scaled.max(1))
}

/// Resize to `target_width` keeping the aspect ratio.
pub fn resize_to_width(frame: &RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = frame.dimensions();
    let (new_width, new_height) = scaled_dimensions(width, height, target_width);

    if (new_width, new_height) == (width, height) {
        return frame.clone();
    }

    // Triangle is the closest of image's filters to area averaging when shrinking.
    imageops::resize(frame, new_width, new_height, FilterType::Triangle)
}

pub fn grayscale(frame: &RgbImage) -> GrayImage {
    imageops::grayscale(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use proptest::prelude::*;

    #[test]
    fn resize_keeps_aspect_ratio() {
        let frame = RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]));
        let resized = resize_to_width(&frame, 1200);
        assert_eq!(resized.dimensions(), (1200, 900));
    }

    #[test]
    fn resize_rounds_height() {
        // 333 * 1200 / 1000 = 399.6
        assert_eq!(scaled_dimensions(1000, 333, 1200), (1200, 400));
    }

    #[test]
    fn same_width_is_untouched() {
        let frame = RgbImage::from_fn(1200, 10, |x, y| Rgb([x as u8, y as u8, 0]));
        assert_eq!(resize_to_width(&frame, 1200), frame);
    }

    #[test]
    fn grayscale_keeps_dimensions() {
        let frame = RgbImage::from_pixel(30, 20, Rgb([255, 255, 255]));
        let gray = grayscale(&frame);
        assert_eq!(gray.dimensions(), (30, 20));
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
    }

    proptest! {
        #[test]
        fn height_follows_rounding_rule(w in 1u32..4000, h in 1u32..4000) {
            let (tw, th) = scaled_dimensions(w, h, 1200);
            prop_assert_eq!(tw, 1200);
            prop_assert_eq!(th, ((h as f64 * 1200.0 / w as f64).round() as u32).max(1));
        }
    }
}
