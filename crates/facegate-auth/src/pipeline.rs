//! Request interceptors in front of the protected view.
//!
//! Order, outermost first: the session layer loads the session for the
//! cookie, then `require_authenticated` either answers with a redirect into
//! the login transaction or hands the request on exactly once.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    Router,
};
use facegate_types::config::{AuthConfig, MAX_SESSION_IDLE_MINUTES};
use tower_sessions::{
    cookie::{time::Duration, SameSite},
    Expiry, MemoryStore, Session, SessionManagerLayer,
};
use tracing::debug;

use crate::{session::is_local_path, AuthFailure, AuthGate, SessionAuth};

pub const SESSION_COOKIE: &str = "facegate.sid";

/// Server-side session store keyed by cookie.
///
/// `SameSite=Lax` so the cookie survives the provider's top-level redirect
/// back to the callback. The idle window is clamped to what `validate`
/// accepts, so unvalidated configs cannot overflow the cookie duration.
pub fn session_layer(config: &AuthConfig) -> SessionManagerLayer<MemoryStore> {
    let idle = config
        .session_idle_minutes
        .clamp(1, MAX_SESSION_IDLE_MINUTES);
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(idle)))
}

/// Lets only authenticated sessions through; everyone else is sent to log in
/// and comes back to the same path afterwards.
pub async fn require_authenticated(
    State(gate): State<AuthGate>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = SessionAuth::new(&session);
    match auth.identity().await {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => {
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .filter(|path| is_local_path(path))
                .unwrap_or(gate.config().protected_path.as_str());
            debug!("Unauthenticated request for {target}; starting login");
            if let Err(err) = auth.remember_return_to(target).await {
                return AuthFailure::from(err).into_response();
            }
            Redirect::to(&gate.config().login_path).into_response()
        }
        Err(err) => AuthFailure::from(err).into_response(),
    }
}

/// Puts every route of `router` behind [`require_authenticated`].
pub fn protect(router: Router, gate: AuthGate) -> Router {
    router.route_layer(middleware::from_fn_with_state(gate, require_authenticated))
}
