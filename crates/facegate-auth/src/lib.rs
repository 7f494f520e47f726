//! Federated login for the gateway: provider seam, session state and routes.

use std::sync::Arc;

use facegate_types::{config::AuthConfig, FacegateError};

mod error;
pub mod pipeline;
pub mod provider;
mod routes;
pub mod session;

pub use error::AuthFailure;
pub use pipeline::{protect, require_authenticated, session_layer};
pub use provider::{AuthorizationRequest, IdentityProvider, OidcProvider};
pub use routes::{routes, CallbackParams};
pub use session::SessionAuth;

/// Unauthenticated entry point every failed round trip ends up on.
pub const LANDING_PATH: &str = "/";

/// Shared state of the auth routes and the interceptor.
#[derive(Clone)]
pub struct AuthGate {
    provider: Arc<dyn IdentityProvider>,
    config: Arc<AuthConfig>,
}

impl AuthGate {
    pub fn new(provider: Arc<dyn IdentityProvider>, config: AuthConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }

    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

pub fn auth_error(message: impl Into<String>) -> FacegateError {
    FacegateError::Auth(message.into())
}
