use axum::response::{IntoResponse, Redirect, Response};
use facegate_types::FacegateError;
use thiserror::Error;
use tracing::{error, warn};

use crate::LANDING_PATH;

/// Failures of the login round trip. All of them answer with a redirect to
/// the landing page; none reach the user as a raw error.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("no matching login transaction in session")]
    InvalidSession,
    #[error("provider rejected the login: {0}")]
    Rejected(String),
    #[error(transparent)]
    Provider(#[from] FacegateError),
    #[error("session store failure: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        match &self {
            AuthFailure::InvalidSession => warn!("Invalid session on callback: {self}"),
            AuthFailure::Rejected(_) => warn!("{self}"),
            AuthFailure::Provider(_) | AuthFailure::Session(_) => {
                error!("Login round trip failed: {self}")
            }
        }
        Redirect::to(LANDING_PATH).into_response()
    }
}
