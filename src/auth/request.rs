//! Per-attempt authorization request and its in-memory PKCE secret.

use std::fmt;

use reqwest::Url;

use super::error::AuthError;
use super::pkce::{generate_state, PkcePair};
use crate::config::ProviderConfig;

/// Parameters sent to the provider's authorization endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub authorize_url: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: &'static str,
}

impl AuthorizationRequest {
    /// Full authorization URL with every query parameter attached.
    pub fn url(&self) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.authorize_url).map_err(|e| {
            AuthError::Configuration(format!(
                "invalid authorize url '{}': {e}",
                self.authorize_url
            ))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &self.state)
            .append_pair("code_challenge", &self.code_challenge)
            .append_pair("code_challenge_method", self.code_challenge_method);
        Ok(url)
    }
}

/// One login attempt in flight.
///
/// Holds the PKCE verifier, which never leaves memory. The value is not
/// `Clone` and is consumed when the redirect result is handled, so an
/// attempt completes at most once.
pub struct PendingLogin {
    request: AuthorizationRequest,
    code_verifier: String,
}

impl fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLogin")
            .field("request", &self.request)
            .field("code_verifier", &"..")
            .finish()
    }
}

impl PendingLogin {
    /// Fresh PKCE pair and state for the configured provider.
    pub fn start(config: &ProviderConfig) -> Self {
        let pkce = PkcePair::generate();
        let request = AuthorizationRequest {
            authorize_url: config.authorize_url.clone(),
            client_id: config.client_id.clone(),
            scopes: config.scopes.clone(),
            redirect_uri: config.redirect_uri.clone(),
            state: generate_state(),
            code_challenge: pkce.challenge.clone(),
            code_challenge_method: pkce.method(),
        };
        Self {
            request,
            code_verifier: pkce.verifier,
        }
    }

    pub fn request(&self) -> &AuthorizationRequest {
        &self.request
    }

    pub fn state(&self) -> &str {
        &self.request.state
    }

    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }
}
