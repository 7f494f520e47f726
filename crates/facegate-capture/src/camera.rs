//! Live webcam source backed by nokhwa.
//!
//! A nokhwa `Camera` cannot leave the thread that opened it, so each source
//! owns a worker thread that holds the device and answers frame requests
//! over a channel. Dropping the source closes the channel and stops the
//! stream.

use async_trait::async_trait;
use facegate_types::{
    capture::{Frame, MediaConstraints, StreamInfo},
    FacegateError, Result,
};
use nokhwa::{
    pixel_format::RgbAFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    Camera, NokhwaError,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{capture_error, source::ensure_video, VideoSource};

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const REQUESTED_FPS: u32 = 30;

/// Lower-cased fragments that mark an open failure as denied access.
const DENIAL_MARKERS: [&str; 5] = [
    "permission",
    "denied",
    "not authorized",
    "not permitted",
    "eacces",
];

type FrameReply = oneshot::Sender<Result<Frame>>;

pub struct CameraSource {
    index: u32,
    requests: Option<mpsc::UnboundedSender<FrameReply>>,
}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            requests: None,
        }
    }
}

#[async_trait]
impl VideoSource for CameraSource {
    async fn acquire(&mut self, constraints: MediaConstraints) -> Result<StreamInfo> {
        ensure_video(constraints)?;
        let (requests, inbox) = mpsc::unbounded_channel();
        let (ready, opened) = oneshot::channel();
        let index = self.index;
        std::thread::Builder::new()
            .name(format!("camera-{index}"))
            .spawn(move || run_camera(index, ready, inbox))
            .map_err(|err| capture_error(format!("cannot start camera thread: {err}")))?;

        let stream = opened
            .await
            .map_err(|_| capture_error("camera thread exited while opening the device"))??;
        self.requests = Some(requests);
        Ok(stream)
    }

    async fn current_frame(&self) -> Result<Frame> {
        let Some(requests) = &self.requests else {
            return Err(capture_error("stream has not been acquired"));
        };
        let (reply, frame) = oneshot::channel();
        requests
            .send(reply)
            .map_err(|_| capture_error("camera thread has stopped"))?;
        frame
            .await
            .map_err(|_| capture_error("camera thread has stopped"))?
    }
}

fn run_camera(
    index: u32,
    ready: oneshot::Sender<Result<StreamInfo>>,
    mut inbox: mpsc::UnboundedReceiver<FrameReply>,
) {
    let mut camera = match open_camera(index) {
        Ok(camera) => camera,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let resolution = camera.resolution();
    info!(
        "Camera {index} streaming at {}x{}",
        resolution.width(),
        resolution.height()
    );
    let stream = StreamInfo::new(
        f64::from(resolution.width()),
        f64::from(resolution.height()),
    );

    if ready.send(Ok(stream)).is_ok() {
        while let Some(reply) = inbox.blocking_recv() {
            let _ = reply.send(grab_frame(&mut camera));
        }
    }
    match camera.stop_stream() {
        Ok(()) => debug!("Camera {index} stopped"),
        Err(err) => warn!("Camera {index} did not stop cleanly: {err}"),
    }
}

fn open_camera(index: u32) -> Result<Camera> {
    let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(REQUESTED_WIDTH, REQUESTED_HEIGHT),
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        ),
    ));
    let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(camera_error)?;
    camera.open_stream().map_err(camera_error)?;
    Ok(camera)
}

fn grab_frame(camera: &mut Camera) -> Result<Frame> {
    let buffer = camera.frame().map_err(camera_error)?;
    let image = buffer.decode_image::<RgbAFormat>().map_err(camera_error)?;
    let (width, height) = image.dimensions();
    Frame::new(width, height, image.into_raw())
}

fn camera_error(err: NokhwaError) -> FacegateError {
    let opening = matches!(
        err,
        NokhwaError::OpenDeviceError { .. } | NokhwaError::OpenStreamError { .. }
    );
    classify(opening, err.to_string())
}

/// Denied device access becomes a permission error; everything else is a
/// capture failure.
fn classify(opening: bool, message: String) -> FacegateError {
    let lowered = message.to_ascii_lowercase();
    if opening && DENIAL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        FacegateError::Permission(message)
    } else {
        capture_error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_open_is_a_permission_error() {
        let err = classify(
            true,
            "Could not open device 0: Permission denied (os error 13)".into(),
        );
        assert!(err.is_permission());
        let err = classify(true, "Camera access not authorized by the user".into());
        assert!(err.is_permission());
    }

    #[test]
    fn other_failures_are_capture_errors() {
        let missing = classify(true, "Could not open device 5: No such device".into());
        assert!(!missing.is_permission());
        assert!(matches!(missing, FacegateError::Capture(_)));

        let decode = classify(false, "permission bits unreadable in frame header".into());
        assert!(matches!(decode, FacegateError::Capture(_)));
    }

    #[test]
    fn nokhwa_open_errors_are_classified_by_message() {
        let err = camera_error(NokhwaError::OpenStreamError(
            "EACCES while starting capture".into(),
        ));
        assert!(err.is_permission());
        let err = camera_error(NokhwaError::ReadFrameError("timed out".into()));
        assert!(!err.is_permission());
    }

    #[tokio::test]
    async fn frames_need_an_acquired_stream() {
        let source = CameraSource::new(0);
        assert!(source.current_frame().await.is_err());
    }

    #[tokio::test]
    async fn audio_only_request_is_refused_before_opening() {
        let mut source = CameraSource::new(u32::MAX);
        let audio_only = MediaConstraints {
            video: false,
            audio: true,
        };
        let err = source.acquire(audio_only).await.expect_err("refused");
        assert!(matches!(err, FacegateError::Capture(_)));
    }
}
