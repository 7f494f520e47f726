use std::{path::PathBuf, sync::Mutex};

use facegate_capture::{data_uri, CaptureView};
use tracing::warn;

/// Terminal stand-in for the capture page: counts go to stdout, alerts to
/// stderr, and the latest preview optionally to an image file.
pub struct ConsoleView {
    preview_out: Option<PathBuf>,
    last_count: Mutex<Option<String>>,
}

impl ConsoleView {
    pub fn new(preview_out: Option<PathBuf>) -> Self {
        Self {
            preview_out,
            last_count: Mutex::new(None),
        }
    }

    pub fn last_count(&self) -> Option<String> {
        self.last_count.lock().ok().and_then(|count| count.clone())
    }
}

impl CaptureView for ConsoleView {
    fn show_preview(&self, data_url: &str) {
        let Some(path) = &self.preview_out else {
            return;
        };
        let written = data_uri::to_payload(data_url)
            .map_err(|err| err.to_string())
            .and_then(|payload| std::fs::write(path, payload.bytes).map_err(|err| err.to_string()));
        if let Err(err) = written {
            warn!("Could not write preview to {}: {err}", path.display());
        }
    }

    fn show_face_count(&self, text: &str) {
        println!("{text}");
        if let Ok(mut last) = self.last_count.lock() {
            *last = Some(text.to_string());
        }
    }

    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}
