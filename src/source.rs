//! Frame sources for video mode, and still image loading.
//!
//! Every source owns its underlying resource and releases it on drop, so the video loop gets the
//! same cleanup whether it ends at end of stream, on the cancel key, or on an error.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, RgbImage};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub trait FrameSource {
    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).next_frame()
    }
}

pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|err| Error::source_unreadable(path, err))?;
    debug!(width = image.width(), height = image.height(), "loaded {}", path.display());
    Ok(image.to_rgb8())
}

/// Open a video path: a directory of still frames, an animated GIF, or a video file OpenCV decodes.
pub fn open_video<P: AsRef<Path>>(path: P) -> Result<Box<dyn FrameSource>> {
    let path = path.as_ref();

    if path.is_dir() {
        return Ok(Box::new(DirectorySource::open(path)?));
    }
    if !path.is_file() {
        return Err(Error::source_unreadable(path, "no such file or directory"));
    }

    let is_gif = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));

    if is_gif {
        Ok(Box::new(GifSource::open(path)?))
    } else {
        open_video_file(path)
    }
}

/// Frames of an animated GIF, composited onto the full canvas.
pub struct GifSource {
    frames: Frames<'static>,
}

impl GifSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| Error::source_unreadable(path, err))?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|err| Error::source_unreadable(path, err))?;
        info!("reading GIF frames from {}", path.display());

        Ok(Self {
            frames: decoder.into_frames(),
        })
    }
}

impl FrameSource for GifSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.next() {
            Some(frame) => Ok(Some(DynamicImage::ImageRgba8(frame?.into_buffer()).to_rgb8())),
            None => Ok(None),
        }
    }
}

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Still images in a directory, in file name order.
pub struct DirectorySource {
    paths: std::vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|err| Error::source_unreadable(dir, err))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)));
            if is_frame {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(Error::source_unreadable(dir, "directory contains no image frames"));
        }

        info!(frames = paths.len(), "reading frames from {}", dir.display());
        Ok(Self {
            paths: paths.into_iter(),
        })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.paths.next() {
            Some(path) => Ok(Some(image::open(&path)?.to_rgb8())),
            None => Ok(None),
        }
    }
}

/// Frames decoded by OpenCV's `VideoCapture`, which picks a backend (usually FFmpeg) and applies
/// the container's rotation metadata.
#[cfg(feature = "opencv")]
pub struct VideoCaptureSource {
    capture: opencv::videoio::VideoCapture,
    frame: opencv::core::Mat,
}

#[cfg(feature = "opencv")]
impl VideoCaptureSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        use opencv::prelude::*;
        use opencv::videoio::{VideoCapture, CAP_ANY};

        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::source_unreadable(path, "path is not valid UTF-8"))?;

        let capture = VideoCapture::from_file(path_str, CAP_ANY).map_err(|err| Error::source_unreadable(path, err))?;
        if !capture.is_opened()? {
            return Err(Error::source_unreadable(path, "no video decoder could open the file"));
        }

        info!("decoding {} with OpenCV", path.display());
        Ok(Self {
            capture,
            frame: opencv::core::Mat::default(),
        })
    }
}

#[cfg(feature = "opencv")]
impl FrameSource for VideoCaptureSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        use opencv::prelude::*;

        if !self.capture.read(&mut self.frame)? || self.frame.empty() {
            return Ok(None);
        }
        Ok(Some(crate::cv::mat_to_rgb(&self.frame)?))
    }
}

#[cfg(feature = "opencv")]
impl Drop for VideoCaptureSource {
    fn drop(&mut self) {
        use opencv::prelude::*;

        let _ = self.capture.release();
        debug!("video capture released");
    }
}

#[cfg(feature = "opencv")]
fn open_video_file(path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoCaptureSource::open(path)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video_file(path: &Path) -> Result<Box<dyn FrameSource>> {
    Err(Error::source_unreadable(
        path,
        "video files need the `opencv` feature; pass an animated GIF or a directory of frames",
    ))
}
