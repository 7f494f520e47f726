//! Video sources that stand in for a camera.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use facegate_types::{
    capture::{Frame, MediaConstraints, StreamInfo},
    FacegateError, Result,
};
use tracing::{debug, info};

use crate::{capture_error, VideoSource};

pub(crate) fn ensure_video(constraints: MediaConstraints) -> Result<()> {
    if constraints.video {
        Ok(())
    } else {
        Err(capture_error("no video track requested"))
    }
}

/// Serves the same picture from disk for every frame.
pub struct StillImageSource {
    path: PathBuf,
    frame: Option<Frame>,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
        }
    }
}

#[async_trait]
impl VideoSource for StillImageSource {
    async fn acquire(&mut self, constraints: MediaConstraints) -> Result<StreamInfo> {
        ensure_video(constraints)?;
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| match err.kind() {
            ErrorKind::PermissionDenied => FacegateError::Permission(format!(
                "cannot open {}: {err}",
                self.path.display()
            )),
            _ => capture_error(format!("cannot open {}: {err}", self.path.display())),
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|err| capture_error(format!("{} is not an image: {err}", self.path.display())))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        info!(
            "Still image source {} streaming at {}x{}",
            self.path.display(),
            width,
            height
        );
        self.frame = Some(Frame::new(width, height, image.into_raw())?);
        Ok(StreamInfo::new(f64::from(width), f64::from(height)))
    }

    async fn current_frame(&self) -> Result<Frame> {
        let Some(frame) = &self.frame else {
            return Err(capture_error("stream has not been acquired"));
        };
        let mut frame = frame.clone();
        frame.captured_at = chrono::Utc::now();
        Ok(frame)
    }
}

/// Generates a gradient test pattern of a fixed size.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    streaming: bool,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            streaming: false,
        }
    }

    fn pattern(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let r = (x * 255 / self.width.max(1)) as u8;
                let g = (y * 255 / self.height.max(1)) as u8;
                data.extend_from_slice(&[r, g, 128, 255]);
            }
        }
        data
    }
}

#[async_trait]
impl VideoSource for SyntheticSource {
    async fn acquire(&mut self, constraints: MediaConstraints) -> Result<StreamInfo> {
        ensure_video(constraints)?;
        self.streaming = true;
        debug!("Synthetic source streaming at {}x{}", self.width, self.height);
        Ok(StreamInfo::new(f64::from(self.width), f64::from(self.height)))
    }

    async fn current_frame(&self) -> Result<Frame> {
        if !self.streaming {
            return Err(capture_error("stream has not been acquired"));
        }
        Frame::new(self.width, self.height, self.pattern())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn still_image_reports_native_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("still.png");
        RgbaImage::from_pixel(6, 4, Rgba([9, 8, 7, 255]))
            .save(&path)
            .expect("write png");

        let mut source = StillImageSource::new(&path);
        assert!(source.current_frame().await.is_err());
        let info = source
            .acquire(MediaConstraints::video_only())
            .await
            .expect("acquire");
        assert_eq!(info, StreamInfo::new(6.0, 4.0));
        let frame = source.current_frame().await.expect("frame");
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(&frame.data[..4], &[9, 8, 7, 255]);
    }

    #[tokio::test]
    async fn missing_file_is_not_a_permission_error() {
        let mut source = StillImageSource::new("/definitely/not/here.png");
        let err = source
            .acquire(MediaConstraints::video_only())
            .await
            .expect_err("missing file");
        assert!(!err.is_permission());
    }

    #[tokio::test]
    async fn synthetic_source_requires_video() {
        let mut source = SyntheticSource::new(4, 2);
        let audio_only = MediaConstraints {
            video: false,
            audio: true,
        };
        assert!(source.acquire(audio_only).await.is_err());
        source
            .acquire(MediaConstraints::video_only())
            .await
            .expect("acquire");
        let frame = source.current_frame().await.expect("frame");
        assert_eq!(frame.data.len(), 4 * 2 * 4);
    }
}
