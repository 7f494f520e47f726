use thiserror::Error;

pub type Result<T, E = FacegateError> = std::result::Result<T, E>;

/// Unified error type covering the capture client and the auth gateway.
#[derive(Debug, Error)]
pub enum FacegateError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("capture error: {0}")]
    Capture(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("detection error: {0}")]
    Detection(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FacegateError {
    /// Camera permission problems are the only failures surfaced to the user.
    pub fn is_permission(&self) -> bool {
        matches!(self, FacegateError::Permission(_))
    }
}
