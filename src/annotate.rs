use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_polygon_mut;
use line_drawing::Bresenham;

use crate::font;
use crate::geometry::{convex_hull, Point};

pub const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TEXT_SCALE: u32 = 6;

fn put_clipped(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

pub fn draw_line(image: &mut RgbImage, from: Point, to: Point, color: Rgb<u8>) {
    let start = (from.x.round() as i32, from.y.round() as i32);
    let end = (to.x.round() as i32, to.y.round() as i32);

    for (x, y) in Bresenham::new(start, end) {
        put_clipped(image, x, y, color);
    }
    put_clipped(image, end.0, end.1, color);
}

/// Draw the closed outline through `points` in order.
pub fn draw_polygon(image: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
    match points {
        [] => {}
        [p] => put_clipped(image, p.x.round() as i32, p.y.round() as i32, color),
        _ => {
            let outline: Vec<imageproc::point::Point<f32>> =
                points.iter().map(|p| imageproc::point::Point::new(p.x, p.y)).collect();
            draw_hollow_polygon_mut(image, &outline, color);
        }
    }
}

/// Outline the convex hull of an eye contour, 1px wide.
pub fn draw_eye_contour(image: &mut RgbImage, eye: &[Point]) {
    draw_polygon(image, &convex_hull(eye), CONTOUR_COLOR);
}

pub fn draw_label(image: &mut RgbImage, text: &str, x: i32, y: i32) {
    font::draw_text(image, text, x, y, TEXT_SCALE, TEXT_COLOR);
}

/// Left margin and baseline of the video overlay.
const VIDEO_LABEL_ORIGIN: (i32, i32) = (10, 100);
/// The EAR label starts here unless a long blink count pushes it further right.
const VIDEO_EAR_LABEL_X: i32 = 400;

/// Positions of the blink count and EAR labels, the second placed clear of the first.
pub fn video_label_positions(blinks_text: &str) -> [(i32, i32); 2] {
    let (x, y) = VIDEO_LABEL_ORIGIN;
    let blinks_width = font::text_size(blinks_text, TEXT_SCALE).0 as i32;
    let gap = 2 * TEXT_SCALE as i32;
    [(x, y), (VIDEO_EAR_LABEL_X.max(x + blinks_width + gap), y)]
}

/// The video overlay: `Blinks: N` and `EAR: x.xx` on one line.
pub fn draw_video_labels(image: &mut RgbImage, total_blinks: u32, ear: f32) {
    let blinks = blinks_label(total_blinks);
    let [(bx, by), (ex, ey)] = video_label_positions(&blinks);
    draw_label(image, &blinks, bx, by);
    draw_label(image, &ear_label(ear), ex, ey);
}

pub fn ear_label(ear: f32) -> String {
    format!("EAR: {:.2}", ear)
}

pub fn blinks_label(total: u32) -> String {
    format!("Blinks: {}", total)
}
