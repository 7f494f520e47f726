//! Typed access to the auth-related entries of a browser session.

use facegate_types::auth::{AuthStage, Identity, PendingLogin};
use tower_sessions::{session::Error, Session};

const PENDING_LOGIN_KEY: &str = "facegate.pending_login";
const IDENTITY_KEY: &str = "facegate.identity";
const RETURN_TO_KEY: &str = "facegate.return_to";

pub struct SessionAuth<'a> {
    session: &'a Session,
}

impl<'a> SessionAuth<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub async fn stage(&self) -> Result<AuthStage, Error> {
        if self.identity().await?.is_some() {
            return Ok(AuthStage::Authenticated);
        }
        let pending: Option<PendingLogin> = self.session.get(PENDING_LOGIN_KEY).await?;
        Ok(match pending {
            Some(_) => AuthStage::PendingCallback,
            None => AuthStage::Anonymous,
        })
    }

    pub async fn identity(&self) -> Result<Option<Identity>, Error> {
        self.session.get(IDENTITY_KEY).await
    }

    pub async fn begin(&self, pending: &PendingLogin) -> Result<(), Error> {
        self.session.insert(PENDING_LOGIN_KEY, pending).await
    }

    /// Removes the pending transaction; a callback can consume it only once.
    pub async fn take_pending(&self) -> Result<Option<PendingLogin>, Error> {
        self.session.remove(PENDING_LOGIN_KEY).await
    }

    pub async fn remember_return_to(&self, path: &str) -> Result<(), Error> {
        self.session.insert(RETURN_TO_KEY, path).await
    }

    pub async fn take_return_to(&self) -> Result<Option<String>, Error> {
        let path: Option<String> = self.session.remove(RETURN_TO_KEY).await?;
        Ok(path.filter(|path| is_local_path(path)))
    }

    /// Marks the session authenticated under a fresh session id.
    pub async fn establish(&self, identity: &Identity) -> Result<(), Error> {
        self.session.cycle_id().await?;
        self.session.insert(IDENTITY_KEY, identity).await
    }

    pub async fn clear(&self) -> Result<(), Error> {
        self.session.flush().await
    }
}

/// Only same-origin absolute paths are valid redirect targets.
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
