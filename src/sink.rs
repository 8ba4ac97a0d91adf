use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    Forever,
    For(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Other(u32),
}

/// Where annotated frames and the EAR plot are shown.
pub trait FrameSink {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()>;

    /// Block for a key press, up to `wait`. Sinks without input return `None` immediately.
    fn wait_key(&mut self, wait: KeyWait) -> Result<Option<Key>>;
}

impl<K: FrameSink + ?Sized> FrameSink for &mut K {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        (**self).show(window, image)
    }

    fn wait_key(&mut self, wait: KeyWait) -> Result<Option<Key>> {
        (**self).wait_key(wait)
    }
}

impl<K: FrameSink + ?Sized> FrameSink for Box<K> {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        (**self).show(window, image)
    }

    fn wait_key(&mut self, wait: KeyWait) -> Result<Option<Key>> {
        (**self).wait_key(wait)
    }
}

/// Map a `waitKey`-style key code: -1 is "no key", 27 is Escape.
pub fn key_from_code(code: i32) -> Option<Key> {
    match code {
        27 => Some(Key::Escape),
        code => u32::try_from(code).ok().map(Key::Other),
    }
}

/// On-screen windows through OpenCV's highgui. Windows are created on first use and closed on drop.
#[cfg(feature = "opencv")]
#[derive(Default)]
pub struct HighGuiSink {
    windows: Vec<String>,
}

#[cfg(feature = "opencv")]
impl HighGuiSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "opencv")]
impl FrameSink for HighGuiSink {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        use opencv::highgui;

        if !self.windows.iter().any(|open| open == window) {
            highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
            self.windows.push(window.to_string());
        }
        highgui::imshow(window, &crate::cv::rgb_to_mat(image)?)?;
        Ok(())
    }

    fn wait_key(&mut self, wait: KeyWait) -> Result<Option<Key>> {
        // highgui treats a delay of 0 as "forever".
        let delay = match wait {
            KeyWait::Forever => 0,
            KeyWait::For(duration) => duration.as_millis().clamp(1, i32::MAX as u128) as i32,
        };
        Ok(key_from_code(opencv::highgui::wait_key(delay)?))
    }
}

#[cfg(feature = "opencv")]
impl Drop for HighGuiSink {
    fn drop(&mut self) {
        if !self.windows.is_empty() {
            let _ = opencv::highgui::destroy_all_windows();
        }
    }
}

/// Headless sink: writes every shown image as `<window>-<n>.png` into a directory. Nobody is there
/// to press a key, so `wait_key` returns at once with `None`.
pub struct DirectorySink {
    dir: PathBuf,
    shown: u64,
}

impl DirectorySink {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, shown: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, window: &str) -> String {
        let slug: String = window
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("{}-{:05}.png", slug, self.shown)
    }
}

impl FrameSink for DirectorySink {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        let path = self.dir.join(self.file_name(window));
        image.save(&path)?;
        debug!("wrote {}", path.display());
        self.shown += 1;
        Ok(())
    }

    fn wait_key(&mut self, _wait: KeyWait) -> Result<Option<Key>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn frames_are_numbered_per_show() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path().join("out")).unwrap();
        let frame = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));

        sink.show("Frame", &frame).unwrap();
        sink.show("Frame", &frame).unwrap();
        sink.show("EAR plot", &frame).unwrap();

        assert!(sink.dir().join("frame-00000.png").exists());
        assert!(sink.dir().join("frame-00001.png").exists());
        assert!(sink.dir().join("ear_plot-00002.png").exists());
        assert_eq!(sink.wait_key(KeyWait::Forever).unwrap(), None);
    }

    #[test]
    fn escape_code_cancels() {
        assert_eq!(key_from_code(27), Some(Key::Escape));
        assert_eq!(key_from_code(-1), None);
        assert_eq!(key_from_code(113), Some(Key::Other(113)));
    }

    #[test]
    fn boxed_sinks_forward() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink: Box<dyn FrameSink> = Box::new(DirectorySink::create(dir.path()).unwrap());

        sink.show("Frame", &RgbImage::new(2, 2)).unwrap();

        assert!(dir.path().join("frame-00000.png").exists());
    }
}
