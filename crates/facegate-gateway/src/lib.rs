//! The auth gateway's HTTP server.
//!
//! Startup discovers the identity provider before the listener is bound;
//! nothing is served if the provider cannot be reached.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use facegate_auth::{
    protect, routes, session_layer, AuthFailure, AuthGate, OidcProvider, SessionAuth,
    LANDING_PATH,
};
use facegate_ops::ensure_asset_dir;
use facegate_types::{
    auth::Identity,
    config::{AuthConfig, FacegateConfig, OidcCredentials},
    FacegateError, Result,
};
use thiserror::Error;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::Session;
use tracing::{error, info, warn};

mod views;

pub use views::{escape_html, TemplateViews, FACE_TEMPLATE};

#[derive(Clone)]
struct Pages {
    views: Arc<TemplateViews>,
    auth: Arc<AuthConfig>,
}

#[derive(Debug, Error)]
#[error("page unavailable: {0}")]
pub struct PageError(#[from] FacegateError);

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        error!("{self}");
        (StatusCode::INTERNAL_SERVER_ERROR, "page unavailable").into_response()
    }
}

async fn landing(State(pages): State<Pages>, session: Session) -> Result<Html<String>, AuthFailure> {
    let auth = SessionAuth::new(&session);
    let body = match auth.identity().await? {
        Some(identity) => format!(
            "<p>Signed in as {}.</p>\n<p><a href=\"{}\">Continue</a></p>\n\
             <form method=\"post\" action=\"{}\"><button type=\"submit\">Log out</button></form>",
            escape_html(identity.display_name()),
            pages.auth.protected_path,
            pages.auth.logout_path,
        ),
        None => format!("<p><a href=\"{}\">Log in</a></p>", pages.auth.login_path),
    };
    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Facegate</title>\
         <link rel=\"stylesheet\" href=\"/style.css\"></head>\n<body>\n{body}\n</body>\n</html>\n"
    )))
}

async fn face_view(
    State(pages): State<Pages>,
    Extension(identity): Extension<Identity>,
) -> Result<Html<String>, PageError> {
    let page = pages.views.face(identity.display_name()).await?;
    Ok(Html(page))
}

/// Landing page, auth routes, the protected view and the static fallback,
/// wrapped in the session and trace layers.
pub fn build_router(gate: AuthGate, views: TemplateViews, config: &FacegateConfig) -> Router {
    let pages = Pages {
        views: Arc::new(views),
        auth: Arc::new(config.auth.clone()),
    };
    let landing_page = Router::new()
        .route(LANDING_PATH, get(landing))
        .with_state(pages.clone());
    let protected = Router::new()
        .route(&config.auth.protected_path, get(face_view))
        .with_state(pages);

    Router::new()
        .merge(landing_page)
        .merge(routes(gate.clone()))
        .merge(protect(protected, gate))
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(session_layer(&config.auth))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(config: FacegateConfig, credentials: OidcCredentials) -> Result<()> {
    info!("Discovering identity provider at {}", credentials.issuer);
    let provider = match OidcProvider::discover(&credentials, &config).await {
        Ok(provider) => provider,
        Err(err) => {
            error!("Identity provider unavailable, not serving: {err}");
            return Err(err);
        }
    };

    ensure_asset_dir(&config.server.static_dir)?;
    let views = TemplateViews::new(&config.server.views_dir);
    if !views.dir().join(FACE_TEMPLATE).is_file() {
        warn!(
            "Template {} not found in {:?}; the protected view will fail",
            FACE_TEMPLATE,
            views.dir()
        );
    }

    let gate = AuthGate::new(Arc::new(provider), config.auth.clone());
    let app = build_router(gate, views, &config);

    let address = config.server.listen_addr();
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|err| FacegateError::Transport(format!("failed to bind {address}: {err}")))?;
    info!("Gateway listening on {}", config.server.app_base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| FacegateError::Transport(format!("server error: {err}")))?;

    info!("Gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                error!("Failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!("Failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
