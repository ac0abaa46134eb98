//! HTTP calls against the identity provider: token exchange and current user.

use serde::Deserialize;

use super::error::AuthError;
use super::identity::Identity;
use crate::config::ProviderConfig;

/// Token and identity endpoint client.
///
/// # Example
/// ```no_run
/// use discord_session::auth::ProviderClient;
/// use discord_session::config::ProviderConfig;
///
/// # async fn example() -> Result<(), discord_session::auth::AuthError> {
/// let config = ProviderConfig::builder()
///     .client_id("1234")
///     .client_secret("shh")
///     .build();
/// let client = ProviderClient::new(config)?;
/// let token = client.exchange_code("code-from-redirect", "pkce-verifier").await?;
/// let me = client.fetch_identity(&token).await?;
/// println!("{}", me.username);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Codes are single-use at the provider, so callers must not retry
    /// this with the same code.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<String, AuthError> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        let payload: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::Transport(format!(
                "malformed token response (status {status}): {e}"
            ))
        })?;

        match payload.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => {
                tracing::debug!(
                    token_type = %payload.token_type,
                    expires_in = %payload.expires_in,
                    scope = %payload.scope,
                    "access token issued"
                );
                Ok(access_token)
            }
            None => Err(AuthError::ProviderRejected(describe_error(
                status,
                payload.error.as_deref(),
                payload.error_description.as_deref(),
            ))),
        }
    }

    /// Fetch the identity the bearer token belongs to.
    pub async fn fetch_identity(&self, access_token: &str) -> Result<Identity, AuthError> {
        let resp = self
            .client
            .get(self.config.user_url())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message);
            return Err(AuthError::ProviderRejected(describe_error(
                status,
                message.as_deref(),
                None,
            )));
        }

        Ok(resp.json::<Identity>().await?)
    }
}

/// Only the fields that decide the outcome are typed; the rest are just logged.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    #[serde(default)]
    token_type: serde_json::Value,
    #[serde(default)]
    expires_in: serde_json::Value,
    #[serde(default)]
    scope: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: Option<String>,
}

fn describe_error(
    status: reqwest::StatusCode,
    error: Option<&str>,
    description: Option<&str>,
) -> String {
    match (error, description) {
        (Some(error), Some(description)) => format!("{error}: {description} (status {status})"),
        (Some(error), None) => format!("{error} (status {status})"),
        (None, Some(description)) => format!("{description} (status {status})"),
        (None, None) => format!("no access token in response (status {status})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn describe_error_prefers_provider_fields() {
        assert_eq!(
            describe_error(StatusCode::BAD_REQUEST, Some("invalid_grant"), Some("Invalid \"code\" in request.")),
            "invalid_grant: Invalid \"code\" in request. (status 400 Bad Request)"
        );
        assert_eq!(
            describe_error(StatusCode::UNAUTHORIZED, Some("401: Unauthorized"), None),
            "401: Unauthorized (status 401 Unauthorized)"
        );
        assert_eq!(
            describe_error(StatusCode::OK, None, None),
            "no access token in response (status 200 OK)"
        );
    }

    #[test]
    fn token_response_tolerates_error_payload() {
        let payload: TokenResponse =
            serde_json::from_str(r#"{"error":"invalid_client"}"#).unwrap();
        assert!(payload.access_token.is_none());
        assert_eq!(payload.error.as_deref(), Some("invalid_client"));
    }

    #[test]
    fn token_response_ignores_unexpected_extra_field_types() {
        let payload: TokenResponse = serde_json::from_str(
            r#"{"access_token":"T","expires_in":"604800","scope":["identify"],"token_type":null}"#,
        )
        .unwrap();
        assert_eq!(payload.access_token.as_deref(), Some("T"));
        assert_eq!(payload.expires_in, serde_json::json!("604800"));
    }
}
