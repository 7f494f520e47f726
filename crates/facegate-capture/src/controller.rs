//! The capture page's state and event handlers in one value.

use facegate_types::{
    capture::{DetectionResult, ImagePayload, MediaConstraints, StreamInfo},
    config::{CaptureConfig, MAX_TARGET_WIDTH},
    Result,
};
use tracing::{debug, error, info, warn};

use crate::{
    data_uri,
    sizing::{self, DisplaySize},
    surface::{DrawingSurface, SurfaceFormat, PLACEHOLDER_COLOR},
    CaptureView, DetectionClient, VideoSource,
};

pub const PERMISSION_MESSAGE: &str =
    "Permission to access the webcam is required to run this program";

const PLACEHOLDER_QUALITY: u8 = 92;

/// What a capture trigger ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Dimensions unknown; nothing was drawn or sent.
    Skipped,
    Detected(DetectionResult),
    /// The image was sent but no face count came back.
    Unanswered,
}

pub struct CaptureController<S, D, V>
where
    S: VideoSource,
    D: DetectionClient,
    V: CaptureView,
{
    source: S,
    detector: D,
    view: V,
    target_width: u32,
    size: Option<DisplaySize>,
    surface: DrawingSurface,
}

impl<S, D, V> CaptureController<S, D, V>
where
    S: VideoSource,
    D: DetectionClient,
    V: CaptureView,
{
    pub fn new(config: &CaptureConfig, source: S, detector: D, view: V) -> Self {
        let target_width = config.target_width.min(MAX_TARGET_WIDTH);
        let placeholder_height =
            (f64::from(target_width) / sizing::FALLBACK_ASPECT).round() as u32;
        Self {
            source,
            detector,
            view,
            target_width,
            size: None,
            surface: DrawingSurface::new(target_width, placeholder_height),
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn display_size(&self) -> Option<DisplaySize> {
        self.size
    }

    /// Paints the preview with the neutral placeholder.
    pub fn reset_view(&mut self) -> Result<()> {
        self.surface.fill(PLACEHOLDER_COLOR);
        let data_url = self.surface.to_data_url(SurfaceFormat::Jpeg {
            quality: PLACEHOLDER_QUALITY,
        })?;
        self.view.show_preview(&data_url);
        Ok(())
    }

    /// Resets the preview and opens the camera, video only.
    pub async fn initialize(&mut self) -> Result<StreamInfo> {
        if let Err(err) = self.reset_view() {
            warn!("Failed to paint placeholder: {err}");
        }
        match self.source.acquire(MediaConstraints::video_only()).await {
            Ok(stream) => {
                info!("Camera stream ready ({}x{})", stream.width, stream.height);
                Ok(stream)
            }
            Err(err) if err.is_permission() => {
                warn!("Camera access denied: {err}");
                self.view.alert(PERMISSION_MESSAGE);
                Err(err)
            }
            Err(err) => {
                error!("An error occurred: {err}");
                Err(err)
            }
        }
    }

    /// Handles the stream's first "can play" signal. Later calls are ignored.
    pub fn on_can_play(&mut self, stream: StreamInfo) -> bool {
        if self.size.is_some() {
            return false;
        }
        let size = DisplaySize::calibrate(self.target_width, stream);
        self.surface.resize(size.width, size.pixel_height());
        debug!("Display sized to {}x{}", size.width, size.height);
        self.size = Some(size);
        true
    }

    /// Draws the current frame, previews it and submits it for detection.
    pub async fn capture(&mut self) -> Result<CaptureOutcome> {
        let Some(size) = self.size.filter(DisplaySize::is_drawable) else {
            debug!("Capture ignored: display size unknown");
            return Ok(CaptureOutcome::Skipped);
        };

        let frame = self.source.current_frame().await?;
        self.surface.resize(size.width, size.pixel_height());
        self.surface.draw_frame(&frame)?;
        let data_url = self.surface.to_data_url(SurfaceFormat::Png)?;
        let payload = data_uri::to_payload(&data_url)?;
        self.view.show_preview(&data_url);

        Ok(self.submit(payload).await)
    }

    async fn submit(&self, payload: ImagePayload) -> CaptureOutcome {
        match self.detector.detect(payload).await {
            Ok(Some(result)) => {
                self.view.show_face_count(&result.display_text());
                CaptureOutcome::Detected(result)
            }
            Ok(None) => CaptureOutcome::Unanswered,
            Err(err) => {
                warn!("Detection request failed: {err}");
                CaptureOutcome::Unanswered
            }
        }
    }
}
