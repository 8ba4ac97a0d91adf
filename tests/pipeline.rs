//! End-to-end pipeline tests with synthetic face detector and landmark regressor.
//!
//! Frames are solid gray. The gray level encodes the scripted EAR of the large face
//! (`ear = level / 250`); level 0 means "no face in this frame".

use std::cell::Cell;
use std::rc::Rc;

use blink_detection::geometry::{LEFT_EYE, NUM_LANDMARKS, RIGHT_EYE};
use blink_detection::pipeline::{FRAME_WINDOW, PLOT_WINDOW};
use blink_detection::{
    FaceDetector, FrameSink, FrameSource, Key, KeyWait, LandmarkRegressor, PipelineConfig, Point, Rectangle,
    Session,
};
use image::{GrayImage, Rgb, RgbImage};

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 300;
const OPEN: u8 = 100;
const CLOSED: u8 = 25;
const NO_FACE: u8 = 0;

const LARGE_FACE: Rectangle = Rectangle { x: 200.0, y: 50.0, width: 400.0, height: 200.0 };
const SMALL_FACE: Rectangle = Rectangle { x: 800.0, y: 50.0, width: 80.0, height: 80.0 };

struct ScriptedDetector {
    with_small_face: bool,
}

impl FaceDetector for ScriptedDetector {
    fn detect_faces(&mut self, gray: &GrayImage) -> Vec<Rectangle> {
        if gray.get_pixel(0, 0)[0] == NO_FACE {
            return Vec::new();
        }
        if self.with_small_face {
            // Listed first so a "last face wins" policy would pick it.
            vec![LARGE_FACE, SMALL_FACE]
        } else {
            vec![LARGE_FACE]
        }
    }
}

/// Eye contour with the given EAR: width 120, lids a third of the way in from each corner.
fn eye(center: (f32, f32), ear: f32) -> [Point; 6] {
    let (cx, cy) = center;
    let half_open = ear * 120.0 / 2.0;
    [
        Point::new(cx - 60.0, cy),
        Point::new(cx - 20.0, cy - half_open),
        Point::new(cx + 20.0, cy - half_open),
        Point::new(cx + 60.0, cy),
        Point::new(cx + 20.0, cy + half_open),
        Point::new(cx - 20.0, cy + half_open),
    ]
}

fn face_landmarks(region: &Rectangle, ear: f32) -> Vec<Point> {
    let center = Point::new(region.x + region.width / 2.0, region.y + region.height / 2.0);
    let mut points = vec![center; NUM_LANDMARKS];
    let eye_y = region.y + region.height * 0.4;

    for (range, cx) in [(RIGHT_EYE, region.x + region.width * 0.3), (LEFT_EYE, region.x + region.width * 0.7)] {
        for (slot, point) in points[range].iter_mut().zip(eye((cx, eye_y), ear)) {
            *slot = point;
        }
    }
    points
}

/// The large face follows the frame's gray level; the small face always has its eyes shut.
struct ScriptedRegressor;

impl LandmarkRegressor for ScriptedRegressor {
    fn locate_landmarks(&self, gray: &GrayImage, region: &Rectangle) -> Vec<Point> {
        let ear = if region.width < 100.0 {
            0.05
        } else {
            f32::from(gray.get_pixel(0, 0)[0]) / 250.0
        };
        face_landmarks(region, ear)
    }
}

struct FlatRegressor;

impl LandmarkRegressor for FlatRegressor {
    fn locate_landmarks(&self, _gray: &GrayImage, region: &Rectangle) -> Vec<Point> {
        vec![Point::new(region.x, region.y); NUM_LANDMARKS]
    }
}

struct TruncatedRegressor;

impl LandmarkRegressor for TruncatedRegressor {
    fn locate_landmarks(&self, gray: &GrayImage, region: &Rectangle) -> Vec<Point> {
        let mut points = ScriptedRegressor.locate_landmarks(gray, region);
        points.truncate(5);
        points
    }
}

fn frame(level: u8) -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([level, level, level]))
}

struct ScriptedSource {
    levels: std::vec::IntoIter<u8>,
    released: Rc<Cell<bool>>,
}

impl ScriptedSource {
    fn new(levels: &[u8]) -> (Self, Rc<Cell<bool>>) {
        let released = Rc::new(Cell::new(false));
        let source = Self {
            levels: levels.to_vec().into_iter(),
            released: Rc::clone(&released),
        };
        (source, released)
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> blink_detection::Result<Option<RgbImage>> {
        Ok(self.levels.next().map(frame))
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.released.set(true);
    }
}

#[derive(Default)]
struct RecordingSink {
    shown: Vec<(String, RgbImage)>,
    waits: Vec<KeyWait>,
    escape_after: Option<usize>,
    source_released: Option<Rc<Cell<bool>>>,
    released_when_plotted: Option<bool>,
}

impl FrameSink for RecordingSink {
    fn show(&mut self, window: &str, image: &RgbImage) -> blink_detection::Result<()> {
        if window == PLOT_WINDOW {
            self.released_when_plotted = self.source_released.as_ref().map(|flag| flag.get());
        }
        self.shown.push((window.to_string(), image.clone()));
        Ok(())
    }

    fn wait_key(&mut self, wait: KeyWait) -> blink_detection::Result<Option<Key>> {
        self.waits.push(wait);
        let frames = self.shown.iter().filter(|(window, _)| window == FRAME_WINDOW).count();
        Ok(match self.escape_after {
            Some(n) if frames >= n => Some(Key::Escape),
            _ => None,
        })
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        target_width: WIDTH,
        ear_threshold: 0.3,
        consec_frames: 3,
        ..PipelineConfig::default()
    }
}

fn session() -> Session<ScriptedDetector, ScriptedRegressor> {
    Session::new(ScriptedDetector { with_small_face: false }, ScriptedRegressor, config())
}

const O: u8 = OPEN;
const C: u8 = CLOSED;
const N: u8 = NO_FACE;

#[test]
fn scripted_video_counts_blinks() {
    let script = [O, O, C, C, C, O, C, C, O, C, N, C, C, O, C, C, C, C];
    let (source, released) = ScriptedSource::new(&script);
    let mut sink = RecordingSink {
        source_released: Some(released),
        ..RecordingSink::default()
    };

    let summary = session().run_video(source, &mut sink).unwrap();

    // C C C O and C [N] C C O are blinks; C C O is too short; the final closure never reopens.
    assert_eq!(summary.total_blinks, 2);
    assert_eq!(summary.frames, script.len());
    assert!(!summary.cancelled);
    assert_eq!(summary.ear_series.values()[10], None);
    assert!((summary.ear_series.values()[0].unwrap() - 0.4).abs() < 0.01);
    assert!((summary.ear_series.values()[2].unwrap() - 0.1).abs() < 0.01);
}

#[test]
fn video_shows_every_frame_then_the_plot() {
    let (source, released) = ScriptedSource::new(&[O, C, N]);
    let mut sink = RecordingSink {
        source_released: Some(released),
        ..RecordingSink::default()
    };

    session().run_video(source, &mut sink).unwrap();

    let windows: Vec<&str> = sink.shown.iter().map(|(window, _)| window.as_str()).collect();
    assert_eq!(windows, [FRAME_WINDOW, FRAME_WINDOW, FRAME_WINDOW, PLOT_WINDOW]);
    assert_eq!(sink.released_when_plotted, Some(true));
    assert_eq!(sink.waits.last(), Some(&KeyWait::Forever));
    let poll = KeyWait::For(config().key_wait);
    assert!(sink.waits[..3].iter().all(|wait| *wait == poll));
}

#[test]
fn escape_cancels_and_releases_the_source() {
    let (source, released) = ScriptedSource::new(&[C, C, C, C, O, O]);
    let mut sink = RecordingSink {
        escape_after: Some(2),
        ..RecordingSink::default()
    };

    let summary = session().run_video(source, &mut sink).unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.total_blinks, 0);
    assert!(released.get());
}

#[test]
fn frame_without_faces_is_left_untouched() {
    let mut session = session();
    session.process_video_frame(&frame(C));
    let pending = session.tracker().pending_closed_frames();

    let annotated = session.process_video_frame(&frame(N));

    assert_eq!(annotated, frame(N));
    assert_eq!(session.tracker().pending_closed_frames(), pending);
    assert_eq!(session.tracker().total_blinks(), 0);
    assert_eq!(session.ear_series().values().last(), Some(&None));
}

#[test]
fn largest_face_drives_tracking() {
    let mut session = Session::new(ScriptedDetector { with_small_face: true }, ScriptedRegressor, config());

    for level in [O, O, O, O, O] {
        session.process_video_frame(&frame(level));
    }

    // The small face is closed throughout, but only the large, open one is tracked.
    assert_eq!(session.tracker().pending_closed_frames(), 0);
    assert_eq!(session.tracker().total_blinks(), 0);
    assert!(session.ear_series().values().iter().all(|ear| ear.unwrap() > 0.3));
}

#[test]
fn analysis_reports_every_face() {
    let mut session = Session::new(ScriptedDetector { with_small_face: true }, ScriptedRegressor, config());

    let analysis = session.analyze(&frame(O));

    assert_eq!(analysis.faces.len(), 2);
    assert_eq!(analysis.tracked_face().unwrap().region, LARGE_FACE);
    assert!((analysis.faces[1].ear() - 0.05).abs() < 0.01);
}

#[test]
fn degenerate_landmarks_skip_the_face() {
    let mut session = Session::new(ScriptedDetector { with_small_face: false }, FlatRegressor, config());

    let annotated = session.process_video_frame(&frame(O));

    assert_eq!(annotated, frame(O));
    assert_eq!(session.ear_series().values(), &[None]);
}

#[test]
fn wrong_landmark_count_skips_the_face() {
    let mut session = Session::new(ScriptedDetector { with_small_face: false }, TruncatedRegressor, config());

    assert!(session.analyze(&frame(O)).faces.is_empty());
}

#[test]
fn still_image_is_resized_and_annotated() {
    let mut session = session();
    let mut sink = RecordingSink::default();
    let input = RgbImage::from_pixel(WIDTH / 2, HEIGHT / 2, Rgb([O, O, O]));

    session.run_image(&input, &mut sink).unwrap();

    let (window, shown) = &sink.shown[0];
    assert_eq!(window, FRAME_WINDOW);
    assert_eq!(shown.dimensions(), (WIDTH, HEIGHT));
    assert!(shown.pixels().any(|p| *p == blink_detection::annotate::CONTOUR_COLOR));
    assert!(shown.pixels().any(|p| *p == blink_detection::annotate::TEXT_COLOR));
    assert_eq!(sink.waits, [KeyWait::Forever]);
    // Still images never touch the blink state.
    assert!(session.ear_series().is_empty());
}
