use image::{Rgb, RgbImage};

use crate::annotate::draw_line;
use crate::font;
use crate::geometry::Point;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const SERIES: Rgb<u8> = Rgb([31, 119, 180]);
const THRESHOLD: Rgb<u8> = Rgb([214, 39, 40]);

const MARGIN_LEFT: u32 = 70;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 50;
const LABEL_SCALE: u32 = 2;

pub const DEFAULT_PLOT_SIZE: (u32, u32) = (960, 480);

/// Per-frame EAR of a video run. `None` marks frames without a usable face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarSeries {
    values: Vec<Option<f32>>,
}

impl EarSeries {
    pub fn push(&mut self, ear: Option<f32>) {
        self.values.push(ear);
    }

    pub fn values(&self) -> &[Option<f32>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max(&self) -> Option<f32> {
        self.values.iter().flatten().copied().reduce(f32::max)
    }
}

struct Axes {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    frames: usize,
    y_max: f32,
}

impl Axes {
    fn to_pixel(&self, frame: usize, ear: f32) -> Point {
        let x = if self.frames > 1 {
            self.left + self.width * frame as f32 / (self.frames - 1) as f32
        } else {
            self.left
        };
        let y = self.top + self.height * (1.0 - (ear / self.y_max).clamp(0.0, 1.0));
        Point::new(x, y)
    }
}

/// Line plot of EAR over frame index with the blink threshold as a dashed horizontal line.
/// Runs of frames without a face leave gaps in the line.
pub fn render_plot(series: &EarSeries, threshold: f32, width: u32, height: u32) -> RgbImage {
    let width = width.max(MARGIN_LEFT + MARGIN_RIGHT + 10);
    let height = height.max(MARGIN_TOP + MARGIN_BOTTOM + 10);
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);

    let y_max = series.max().unwrap_or(0.0).max(threshold).max(0.1) * 1.1;
    let axes = Axes {
        left: MARGIN_LEFT as f32,
        top: MARGIN_TOP as f32,
        width: (width - MARGIN_LEFT - MARGIN_RIGHT) as f32,
        height: (height - MARGIN_TOP - MARGIN_BOTTOM) as f32,
        frames: series.len(),
        y_max,
    };

    let origin = Point::new(axes.left, axes.top + axes.height);
    draw_line(&mut image, origin, Point::new(axes.left, axes.top), AXIS);
    draw_line(&mut image, origin, Point::new(axes.left + axes.width, origin.y), AXIS);

    let threshold_y = axes.to_pixel(0, threshold).y;
    let mut x = axes.left;
    while x < axes.left + axes.width {
        let end = (x + 8.0).min(axes.left + axes.width);
        draw_line(&mut image, Point::new(x, threshold_y), Point::new(end, threshold_y), THRESHOLD);
        x += 14.0;
    }

    let mut previous: Option<Point> = None;
    for (frame, ear) in series.values().iter().enumerate() {
        previous = match ear {
            Some(ear) => {
                let point = axes.to_pixel(frame, *ear);
                draw_line(&mut image, previous.unwrap_or(point), point, SERIES);
                Some(point)
            }
            None => None,
        };
    }

    let label_height = font::text_size("EAR value", LABEL_SCALE).1 as i32;
    font::draw_text(&mut image, "EAR value", 10, MARGIN_TOP as i32 - 10, LABEL_SCALE, AXIS);
    font::draw_text(
        &mut image,
        &format!("{:.2}", y_max),
        10,
        MARGIN_TOP as i32 + label_height + 10,
        LABEL_SCALE,
        AXIS,
    );
    let frames_label = format!("frame {}", series.len().saturating_sub(1));
    let frames_width = font::text_size(&frames_label, LABEL_SCALE).0 as i32;
    font::draw_text(
        &mut image,
        &frames_label,
        (width - MARGIN_RIGHT) as i32 - frames_width,
        height as i32 - 10,
        LABEL_SCALE,
        AXIS,
    );

    image
}
