use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FacegateError, Result};

pub const RGBA_CHANNELS: usize = 4;

/// A still frame taken from a video source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA pixel buffer, row-major.
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * RGBA_CHANNELS;
        if data.len() != expected {
            return Err(FacegateError::Capture(format!(
                "frame buffer holds {} bytes, {}x{} RGBA needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        })
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * RGBA_CHANNELS)
            .collect();
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Native properties reported by a video source once it is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamInfo {
    /// Native width; `0.0` when the source cannot tell.
    pub width: f64,
    /// Native height; `0.0` when the source cannot tell.
    pub height: f64,
}

impl StreamInfo {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Which tracks to request from a media device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    pub const fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

/// Binary image body ready for upload, tagged with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Number of faces reported by the detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub faces: u64,
}

impl DetectionResult {
    pub fn new(faces: u64) -> Self {
        Self { faces }
    }

    pub fn display_text(&self) -> String {
        format!("Number of faces : {}", self.faces)
    }
}

/// Accepted response bodies of the detection endpoint.
///
/// A bare number is the face count, an array holds one entry per face, and an
/// object carries the count under `faces` or `count`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DetectionResponse {
    Count(u64),
    Faces(Vec<serde_json::Value>),
    Summary(DetectionSummary),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionSummary {
    #[serde(alias = "count")]
    pub faces: u64,
}

impl From<DetectionResponse> for DetectionResult {
    fn from(response: DetectionResponse) -> Self {
        match response {
            DetectionResponse::Count(faces) => DetectionResult::new(faces),
            DetectionResponse::Faces(faces) => DetectionResult::new(faces.len() as u64),
            DetectionResponse::Summary(summary) => DetectionResult::new(summary.faces),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Option<DetectionResult> {
        serde_json::from_str::<DetectionResponse>(body)
            .ok()
            .map(DetectionResult::from)
    }

    #[test]
    fn frame_rejects_mismatched_buffer() {
        assert!(Frame::new(2, 2, vec![0; 15]).is_err());
        let frame = Frame::new(2, 2, vec![0; 16]).expect("valid frame");
        assert_eq!(frame.data.len(), 16);
    }

    #[test]
    fn solid_frame_repeats_color() {
        let frame = Frame::solid(3, 2, [1, 2, 3, 255]);
        assert_eq!(frame.data.len(), 24);
        assert_eq!(&frame.data[20..24], &[1, 2, 3, 255]);
        assert!(!frame.is_empty());
        assert!(Frame::solid(0, 4, [0; 4]).is_empty());
    }

    #[test]
    fn display_text_matches_page_format() {
        assert_eq!(DetectionResult::new(3).display_text(), "Number of faces : 3");
    }

    #[test]
    fn detection_response_shapes() {
        assert_eq!(parse("3"), Some(DetectionResult::new(3)));
        assert_eq!(parse("[{\"x\":1},{\"x\":2}]"), Some(DetectionResult::new(2)));
        assert_eq!(parse("{\"faces\": 4}"), Some(DetectionResult::new(4)));
        assert_eq!(parse("{\"count\": 5}"), Some(DetectionResult::new(5)));
        assert_eq!(parse("\"three\""), None);
        assert_eq!(parse("-1"), None);
    }
}
