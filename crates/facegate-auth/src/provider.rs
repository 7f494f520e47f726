//! Identity provider seam and its OpenID Connect implementation.

use async_trait::async_trait;
use chrono::Utc;
use facegate_types::{
    auth::{Identity, PendingLogin},
    config::{FacegateConfig, OidcCredentials},
    FacegateError, Result,
};
use openidconnect::{
    core::{CoreAuthenticationFlow, CoreClient},
    reqwest::async_http_client,
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, ProviderMetadataWithLogout, RedirectUrl, Scope, TokenResponse,
};
use reqwest::{redirect::Policy, Url};
use tracing::{debug, info};

use crate::auth_error;

/// Where to send the browser to start a login, and what to remember meanwhile.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub pending: PendingLogin,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorization_request(&self) -> Result<AuthorizationRequest>;

    /// Redeems the authorization code and verifies the returned ID token.
    async fn exchange(&self, code: &str, pending: &PendingLogin) -> Result<Identity>;

    /// Tells the provider the user signed out.
    async fn end_session(&self, identity: &Identity) -> Result<()>;
}

pub struct OidcProvider {
    client: CoreClient,
    client_id: String,
    scopes: Vec<Scope>,
    end_session_endpoint: Option<String>,
    post_logout_redirect: String,
    http: reqwest::Client,
}

impl OidcProvider {
    /// Fetches the issuer's discovery document. The gateway only starts
    /// listening once this has succeeded.
    pub async fn discover(credentials: &OidcCredentials, config: &FacegateConfig) -> Result<Self> {
        let issuer = IssuerUrl::new(credentials.issuer.clone())
            .map_err(|err| auth_error(format!("invalid issuer URL: {err}")))?;
        let metadata = ProviderMetadataWithLogout::discover_async(issuer, async_http_client)
            .await
            .map_err(|err| auth_error(format!("provider discovery failed: {err}")))?;
        let end_session_endpoint = metadata
            .additional_metadata()
            .end_session_endpoint
            .as_ref()
            .map(|endpoint| endpoint.url().to_string());

        let callback = config.server.absolute_url(&config.auth.callback_path);
        let redirect = RedirectUrl::new(callback)
            .map_err(|err| auth_error(format!("invalid callback URL: {err}")))?;
        let client = CoreClient::from_provider_metadata(
            metadata,
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
        )
        .set_redirect_uri(redirect);

        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|err| auth_error(format!("failed to build HTTP client: {err}")))?;

        info!(
            "Identity provider {} ready (end session endpoint: {})",
            credentials.issuer,
            end_session_endpoint.as_deref().unwrap_or("none")
        );

        Ok(Self {
            client,
            client_id: credentials.client_id.clone(),
            scopes: config
                .auth
                .scopes
                .iter()
                .filter(|scope| scope.as_str() != "openid")
                .map(|scope| Scope::new(scope.clone()))
                .collect(),
            end_session_endpoint,
            post_logout_redirect: config.server.absolute_url(&config.auth.post_logout_path),
            http,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_request(&self) -> Result<AuthorizationRequest> {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            Nonce::new_random,
        );
        for scope in &self.scopes {
            request = request.add_scope(scope.clone());
        }
        let (url, csrf_state, nonce) = request.set_pkce_challenge(challenge).url();

        Ok(AuthorizationRequest {
            url: url.to_string(),
            pending: PendingLogin {
                csrf_state: csrf_state.secret().clone(),
                nonce: nonce.secret().clone(),
                pkce_verifier: verifier.secret().clone(),
                started_at: Utc::now(),
            },
        })
    }

    async fn exchange(&self, code: &str, pending: &PendingLogin) -> Result<Identity> {
        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|err| auth_error(format!("token exchange failed: {err}")))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| auth_error("provider returned no ID token"))?;
        let nonce = Nonce::new(pending.nonce.clone());
        let claims = id_token
            .claims(&self.client.id_token_verifier(), &nonce)
            .map_err(|err| auth_error(format!("ID token rejected: {err}")))?;

        let name = claims
            .preferred_username()
            .map(|username| username.as_str().to_owned())
            .or_else(|| {
                claims
                    .name()
                    .and_then(|name| name.get(None))
                    .map(|name| name.as_str().to_owned())
            });

        Ok(Identity {
            subject: claims.subject().as_str().to_owned(),
            name,
            id_token: Some(id_token.to_string()),
            authenticated_at: Utc::now(),
        })
    }

    async fn end_session(&self, identity: &Identity) -> Result<()> {
        let Some(endpoint) = &self.end_session_endpoint else {
            debug!("Provider advertises no end session endpoint");
            return Ok(());
        };
        let mut url = Url::parse(endpoint)
            .map_err(|err| auth_error(format!("invalid end session endpoint: {err}")))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(hint) = &identity.id_token {
                query.append_pair("id_token_hint", hint);
            }
            query.append_pair("client_id", &self.client_id);
            query.append_pair("post_logout_redirect_uri", &self.post_logout_redirect);
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FacegateError::Transport(format!("end session request failed: {err}")))?;
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            debug!("Provider acknowledged logout with {status}");
            Ok(())
        } else {
            Err(auth_error(format!("end session endpoint answered {status}")))
        }
    }
}
