use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use facegate_types::auth::AuthStage;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, error, info, warn};

use crate::{AuthFailure, AuthGate, SessionAuth};

/// Query string the provider appends when redirecting back.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Login, callback and logout endpoints at their configured paths.
pub fn routes(gate: AuthGate) -> Router {
    let config = gate.config().clone();
    Router::new()
        .route(&config.login_path, get(login))
        .route(&config.callback_path, get(callback))
        .route(&config.logout_path, get(logout).post(logout))
        .with_state(gate)
}

async fn login(State(gate): State<AuthGate>, session: Session) -> Result<Redirect, AuthFailure> {
    let auth = SessionAuth::new(&session);
    match auth.stage().await? {
        AuthStage::Authenticated => return Ok(Redirect::to(&gate.config().protected_path)),
        AuthStage::PendingCallback => debug!("Replacing an unfinished login transaction"),
        AuthStage::Anonymous => {}
    }
    let request = gate.provider().authorization_request()?;
    auth.begin(&request.pending).await?;
    Ok(Redirect::to(&request.url))
}

async fn callback(
    State(gate): State<AuthGate>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AuthFailure> {
    let auth = SessionAuth::new(&session);
    let Some(pending) = auth.take_pending().await? else {
        return Err(AuthFailure::InvalidSession);
    };
    if let Some(error) = params.error {
        let detail = params.error_description.unwrap_or_default();
        return Err(AuthFailure::Rejected(format!("{error} {detail}").trim().to_string()));
    }
    if params.state.as_deref() != Some(pending.csrf_state.as_str()) {
        return Err(AuthFailure::InvalidSession);
    }
    let Some(code) = params.code else {
        return Err(AuthFailure::Rejected("callback carried no authorization code".into()));
    };

    let identity = gate.provider().exchange(&code, &pending).await?;
    let target = auth
        .take_return_to()
        .await?
        .unwrap_or_else(|| gate.config().protected_path.clone());
    auth.establish(&identity).await?;
    info!("{} signed in", identity.display_name());
    Ok(Redirect::to(&target))
}

/// Provider notification is best effort; the local session is cleared no
/// matter what it returns.
async fn logout(State(gate): State<AuthGate>, session: Session) -> Redirect {
    let auth = SessionAuth::new(&session);
    let identity = auth.identity().await.unwrap_or_else(|err| {
        warn!("Could not read session during logout: {err}");
        None
    });
    if let Some(identity) = &identity {
        if let Err(err) = gate.provider().end_session(identity).await {
            warn!("Provider logout notification failed: {err}");
        }
    }
    if let Err(err) = auth.clear().await {
        error!("Failed to clear session on logout: {err}");
    }
    Redirect::to(&gate.config().post_logout_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
        Extension,
    };
    use chrono::Utc;
    use facegate_types::{
        auth::{Identity, PendingLogin},
        config::AuthConfig,
        FacegateError, Result,
    };
    use tower::ServiceExt;

    use crate::{auth_error, protect, session_layer, AuthorizationRequest, IdentityProvider};

    const AUTHORIZE_URL: &str = "https://idp.test/authorize?state=state-1";

    #[derive(Default)]
    struct FakeProvider {
        fail_logout: bool,
        logouts: AtomicUsize,
        exchanges: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorization_request(&self) -> Result<AuthorizationRequest> {
            Ok(AuthorizationRequest {
                url: AUTHORIZE_URL.into(),
                pending: PendingLogin {
                    csrf_state: "state-1".into(),
                    nonce: "nonce-1".into(),
                    pkce_verifier: "verifier-1".into(),
                    started_at: Utc::now(),
                },
            })
        }

        async fn exchange(&self, code: &str, pending: &PendingLogin) -> Result<Identity> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            assert_eq!(pending.pkce_verifier, "verifier-1");
            if code != "good-code" {
                return Err(auth_error("invalid_grant"));
            }
            Ok(Identity {
                subject: "user-1".into(),
                name: Some("Ada".into()),
                id_token: Some("header.claims.signature".into()),
                authenticated_at: Utc::now(),
            })
        }

        async fn end_session(&self, _identity: &Identity) -> Result<()> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            if self.fail_logout {
                Err(FacegateError::Transport("provider unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn app(provider: Arc<FakeProvider>) -> Router {
        let config = AuthConfig::default();
        let gate = AuthGate::new(provider, config.clone());
        let protected = Router::new().route(
            "/face",
            get(|Extension(identity): Extension<Identity>| async move {
                format!("hello {}", identity.display_name())
            }),
        );
        Router::new()
            .merge(routes(gate.clone()))
            .merge(protect(protected, gate))
            .layer(session_layer(&config))
    }

    /// Browser stand-in that keeps the latest session cookie.
    struct Browser {
        app: Router,
        cookie: Option<String>,
    }

    impl Browser {
        fn new(app: Router) -> Self {
            Self { app, cookie: None }
        }

        async fn get(&mut self, uri: &str) -> Response {
            self.send("GET", uri).await
        }

        async fn send(&mut self, method: &str, uri: &str) -> Response {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(cookie) = &self.cookie {
                request = request.header(header::COOKIE, cookie);
            }
            let response = self
                .app
                .clone()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap();
            if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
                let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
                self.cookie = Some(pair.to_string());
            }
            response
        }
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn protected_view_redirects_anonymous_users_to_login() {
        let mut browser = Browser::new(app(Arc::default()));
        let response = browser.get("/face").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn full_round_trip_reaches_the_protected_view() {
        let provider = Arc::new(FakeProvider::default());
        let mut browser = Browser::new(app(provider.clone()));

        browser.get("/face?src=test").await;
        let pre_login_cookie = browser.cookie.clone();

        let response = browser.get("/login").await;
        assert_eq!(location(&response), AUTHORIZE_URL);

        let response = browser
            .get("/authorization-code/callback?code=good-code&state=state-1")
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/face?src=test");
        assert_ne!(browser.cookie, pre_login_cookie, "session id rotates on login");

        let response = browser.get("/face").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "hello Ada");

        let response = browser.get("/login").await;
        assert_eq!(location(&response), "/face");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_login_restarts_the_transaction() {
        let provider = Arc::new(FakeProvider::default());
        let mut browser = Browser::new(app(provider.clone()));
        assert_eq!(location(&browser.get("/login").await), AUTHORIZE_URL);
        assert_eq!(location(&browser.get("/login").await), AUTHORIZE_URL);

        let response = browser
            .get("/authorization-code/callback?code=good-code&state=state-1")
            .await;
        assert_eq!(location(&response), "/face");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_without_transaction_redirects_to_landing() {
        let provider = Arc::new(FakeProvider::default());
        let mut browser = Browser::new(app(provider.clone()));
        let response = browser
            .get("/authorization-code/callback?code=good-code&state=state-1")
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forged_state_is_an_invalid_session() {
        let provider = Arc::new(FakeProvider::default());
        let mut browser = Browser::new(app(provider.clone()));
        browser.get("/login").await;

        let response = browser
            .get("/authorization-code/callback?code=good-code&state=forged")
            .await;
        assert_eq!(location(&response), "/");

        // The transaction was consumed by the failed attempt.
        let response = browser
            .get("/authorization-code/callback?code=good-code&state=state-1")
            .await;
        assert_eq!(location(&response), "/");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
        assert_eq!(location(&browser.get("/face").await), "/login");
    }

    #[tokio::test]
    async fn provider_errors_and_bad_codes_end_on_landing() {
        let mut browser = Browser::new(app(Arc::default()));
        browser.get("/login").await;
        let response = browser
            .get("/authorization-code/callback?error=access_denied&error_description=nope&state=state-1")
            .await;
        assert_eq!(location(&response), "/");

        browser.get("/login").await;
        let response = browser
            .get("/authorization-code/callback?code=stale-code&state=state-1")
            .await;
        assert_eq!(location(&response), "/");
        assert_eq!(location(&browser.get("/face").await), "/login");
    }

    #[tokio::test]
    async fn logout_clears_session_even_when_provider_fails() {
        let provider = Arc::new(FakeProvider {
            fail_logout: true,
            ..FakeProvider::default()
        });
        let mut browser = Browser::new(app(provider.clone()));
        browser.get("/login").await;
        browser
            .get("/authorization-code/callback?code=good-code&state=state-1")
            .await;
        assert_eq!(browser.get("/face").await.status(), StatusCode::OK);

        let response = browser.send("POST", "/logout").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        assert_eq!(provider.logouts.load(Ordering::SeqCst), 1);

        assert_eq!(location(&browser.get("/face").await), "/login");
    }

    #[tokio::test]
    async fn anonymous_logout_skips_provider() {
        let provider = Arc::new(FakeProvider::default());
        let mut browser = Browser::new(app(provider.clone()));
        let response = browser.get("/logout").await;
        assert_eq!(location(&response), "/");
        assert_eq!(provider.logouts.load(Ordering::SeqCst), 0);
    }
}
