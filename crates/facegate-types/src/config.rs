use std::{env, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{FacegateError, Result};

pub const ISSUER_VAR: &str = "OIDC_ISSUER";
pub const CLIENT_ID_VAR: &str = "OIDC_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "OIDC_CLIENT_SECRET";

/// Longest accepted session inactivity window: one year.
pub const MAX_SESSION_IDLE_MINUTES: i64 = 365 * 24 * 60;
/// Widest accepted capture surface.
pub const MAX_TARGET_WIDTH: u32 = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Scheme, host and port of the app without a trailing path.
    pub app_base_url: String,
    pub static_dir: String,
    pub views_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 5000,
            app_base_url: "http://localhost:5000".into(),
            static_dir: "public".into(),
            views_dir: "views".into(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Absolute URL for a path served by this app.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.app_base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub scopes: Vec<String>,
    pub login_path: String,
    pub callback_path: String,
    /// Where a completed login lands when nothing else was requested.
    pub protected_path: String,
    pub logout_path: String,
    pub post_logout_path: String,
    pub session_idle_minutes: i64,
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scopes: vec!["openid".into(), "profile".into()],
            login_path: "/login".into(),
            callback_path: "/authorization-code/callback".into(),
            protected_path: "/face".into(),
            logout_path: "/logout".into(),
            post_logout_path: "/".into(),
            session_idle_minutes: 60,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub endpoint: String,
    pub target_width: u32,
    pub field_name: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/face".into(),
            target_width: 320,
            field_name: "imgarr".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    pub compact_logs: bool,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            compact_logs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacegateConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub capture: CaptureConfig,
    pub ops: OpsConfig,
}

impl FacegateConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            FacegateError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            FacegateError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(FacegateError::Configuration(
                "server.port must be a valid port (>0)".into(),
            ));
        }
        if !is_http_url(&self.server.app_base_url) {
            return Err(FacegateError::Configuration(
                "server.app_base_url must be an http(s) URL".into(),
            ));
        }
        let paths = [
            ("auth.login_path", &self.auth.login_path),
            ("auth.callback_path", &self.auth.callback_path),
            ("auth.protected_path", &self.auth.protected_path),
            ("auth.logout_path", &self.auth.logout_path),
            ("auth.post_logout_path", &self.auth.post_logout_path),
        ];
        for (name, path) in paths {
            if !path.starts_with('/') {
                return Err(FacegateError::Configuration(format!(
                    "{name} must start with '/' (got {path:?})"
                )));
            }
        }
        let routed = &paths[..4];
        for (index, (name, path)) in routed.iter().enumerate() {
            if path.as_str() == "/" || routed[..index].iter().any(|(_, other)| other == path) {
                return Err(FacegateError::Configuration(format!(
                    "{name} must be distinct from / and the other auth routes"
                )));
            }
        }
        if !self.auth.scopes.iter().any(|scope| scope == "openid") {
            return Err(FacegateError::Configuration(
                "auth.scopes must include openid".into(),
            ));
        }
        if !(1..=MAX_SESSION_IDLE_MINUTES).contains(&self.auth.session_idle_minutes) {
            return Err(FacegateError::Configuration(format!(
                "auth.session_idle_minutes must be between 1 and {MAX_SESSION_IDLE_MINUTES}"
            )));
        }
        if !(1..=MAX_TARGET_WIDTH).contains(&self.capture.target_width) {
            return Err(FacegateError::Configuration(format!(
                "capture.target_width must be between 1 and {MAX_TARGET_WIDTH}"
            )));
        }
        if !is_http_url(&self.capture.endpoint) {
            return Err(FacegateError::Configuration(
                "capture.endpoint must be an http(s) URL".into(),
            ));
        }
        if self.capture.field_name.is_empty() {
            return Err(FacegateError::Configuration(
                "capture.field_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Client registration with the identity provider. Never read from files.
#[derive(Clone)]
pub struct OidcCredentials {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OidcCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcCredentials")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl OidcCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Every value is required; there are no defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    FacegateError::Configuration(format!("{key} must be set and non-empty"))
                })
        };
        Ok(Self {
            issuer: required(ISSUER_VAR)?,
            client_id: required(CLIENT_ID_VAR)?,
            client_secret: required(CLIENT_SECRET_VAR)?,
        })
    }
}
