use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a browser session stands in the login round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStage {
    Anonymous,
    PendingCallback,
    Authenticated,
}

/// State of an authorization request that has been sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub csrf_state: String,
    pub nonce: String,
    pub pkce_verifier: String,
    pub started_at: DateTime<Utc>,
}

/// The authenticated user as established by a completed callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub name: Option<String>,
    /// Raw ID token, kept as the hint for provider logout.
    pub id_token: Option<String>,
    pub authenticated_at: DateTime<Utc>,
}

impl Identity {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.subject)
    }
}
