//! Capture client: turns a live video source into an uploaded still frame.

use async_trait::async_trait;
use facegate_types::{
    capture::{DetectionResult, Frame, ImagePayload, MediaConstraints, StreamInfo},
    FacegateError, Result,
};

#[cfg(feature = "camera")]
pub mod camera;
pub mod controller;
pub mod data_uri;
pub mod detector;
pub mod sizing;
pub mod source;
pub mod surface;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use controller::{CaptureController, CaptureOutcome, PERMISSION_MESSAGE};
pub use detector::HttpDetectionClient;
pub use source::{StillImageSource, SyntheticSource};
pub use surface::DrawingSurface;

/// A camera-like device that can be opened and sampled.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Opens the stream. Denied access must surface as [`FacegateError::Permission`].
    async fn acquire(&mut self, constraints: MediaConstraints) -> Result<StreamInfo>;
    async fn current_frame(&self) -> Result<Frame>;
}

/// Face-detection service the captured image is posted to.
#[async_trait]
pub trait DetectionClient: Send + Sync {
    /// `Ok(None)` means the service answered with something other than 200.
    async fn detect(&self, payload: ImagePayload) -> Result<Option<DetectionResult>>;
}

/// Whatever shows the preview, the face count and alerts to the user.
pub trait CaptureView: Send + Sync {
    fn show_preview(&self, data_url: &str);
    fn show_face_count(&self, text: &str);
    fn alert(&self, message: &str);
}

pub fn capture_error(message: impl Into<String>) -> FacegateError {
    FacegateError::Capture(message.into())
}

pub fn encoding_error(message: impl Into<String>) -> FacegateError {
    FacegateError::Encoding(message.into())
}
