//! Login flow orchestration and in-memory session ownership.

use std::sync::Arc;

use strum::Display;

use super::browser::BrowserLauncher;
use super::error::AuthError;
use super::identity::{Identity, Session};
use super::provider::ProviderClient;
use super::redirect::RedirectOutcome;
use super::request::PendingLogin;
use super::store::SessionStore;
use crate::config::ProviderConfig;

/// Where the controller is in the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FlowState {
    Idle,
    AwaitingRedirect,
    ExchangingCode,
    FetchingIdentity,
    Authenticated,
}

/// What a login attempt ended with.
///
/// Failures are already logged when this is returned; the session is
/// unchanged in every non-`Authenticated` case.
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(Identity),
    Cancelled,
    Failed(AuthError),
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Drives the authorization-code + PKCE flow and owns the [`Session`].
///
/// There is exactly one mutator of the session: every state-changing
/// method takes `&mut self`. The presentation layer reads the session
/// through [`AuthController::session`].
pub struct AuthController {
    provider: ProviderClient,
    launcher: Arc<dyn BrowserLauncher>,
    store: SessionStore,
    session: Option<Session>,
    state: FlowState,
}

impl AuthController {
    pub fn new(provider: ProviderClient, launcher: Arc<dyn BrowserLauncher>, store: SessionStore) -> Self {
        Self {
            provider,
            launcher,
            store,
            session: None,
            state: FlowState::Idle,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn provider_config(&self) -> &ProviderConfig {
        self.provider.config()
    }

    /// Restore a persisted session without touching the network.
    ///
    /// Only succeeds when both the token and the identity are stored. The
    /// token is trusted as-is; a revoked token shows up on the next
    /// provider call.
    pub async fn restore_session(&mut self) -> bool {
        let stored = match self.store.read().await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stored session");
                return false;
            }
        };
        let has_token = stored.access_token.is_some();
        let has_identity = stored.identity.is_some();
        match stored.into_session() {
            Some(session) => {
                tracing::info!(user_id = %session.identity.id, "restored stored session");
                self.session = Some(session);
                self.transition(FlowState::Authenticated);
                true
            }
            None => {
                if has_token || has_identity {
                    tracing::warn!(has_token, has_identity, "ignoring incomplete stored session");
                } else {
                    tracing::debug!("no stored session");
                }
                false
            }
        }
    }

    /// Run one full login attempt: launch, await the redirect, exchange.
    pub async fn begin_login(&mut self) -> LoginOutcome {
        let pending = PendingLogin::start(self.provider.config());
        self.transition(FlowState::AwaitingRedirect);

        let outcome = match self.launcher.authorize(pending.request()).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancellation() => RedirectOutcome::Cancelled,
            Err(err) => {
                tracing::error!(error = %err, "failed to launch authorization");
                self.settle();
                return LoginOutcome::Failed(err);
            }
        };
        self.on_redirect_result(pending, outcome).await
    }

    /// Handle the redirect for `pending`, consuming the attempt.
    pub async fn on_redirect_result(
        &mut self,
        pending: PendingLogin,
        outcome: RedirectOutcome,
    ) -> LoginOutcome {
        tracing::debug!(%outcome, "authorization redirect received");
        match outcome {
            RedirectOutcome::Success { code, state } => {
                if state.as_deref() != Some(pending.state()) {
                    tracing::warn!("authorization redirect state does not match this attempt");
                    self.settle();
                    return LoginOutcome::Failed(AuthError::InvalidRedirect(
                        "state mismatch".to_string(),
                    ));
                }
                match self.exchange_code(&code, pending.code_verifier()).await {
                    Ok(identity) => LoginOutcome::Authenticated(identity),
                    Err(err) => LoginOutcome::Failed(err),
                }
            }
            RedirectOutcome::Cancelled => {
                tracing::info!("authorization cancelled by user");
                self.settle();
                LoginOutcome::Cancelled
            }
            RedirectOutcome::Denied { error, description } => {
                tracing::warn!(%error, description = description.as_deref().unwrap_or(""), "authorization denied");
                self.settle();
                let message = match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                };
                LoginOutcome::Failed(AuthError::ProviderRejected(message))
            }
            RedirectOutcome::Malformed(reason) => {
                tracing::warn!(%reason, "malformed authorization redirect");
                self.settle();
                LoginOutcome::Failed(AuthError::InvalidRedirect(reason))
            }
        }
    }

    /// Exchange `code` for a token, then fetch and persist the identity.
    ///
    /// Never retried: authorization codes are single-use.
    pub async fn exchange_code(&mut self, code: &str, code_verifier: &str) -> Result<Identity, AuthError> {
        self.transition(FlowState::ExchangingCode);
        let token = match self.provider.exchange_code(code, code_verifier).await {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(error = %err, "failed to exchange authorization code");
                self.settle();
                return Err(err);
            }
        };
        self.fetch_identity(&token).await
    }

    /// Fetch the identity for `access_token`; on success it replaces the
    /// session and is persisted together with the token.
    pub async fn fetch_identity(&mut self, access_token: &str) -> Result<Identity, AuthError> {
        self.transition(FlowState::FetchingIdentity);
        let identity = match self.provider.fetch_identity(access_token).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch user identity");
                self.settle();
                return Err(err);
            }
        };

        if let Err(err) = self.store.persist(access_token, &identity).await {
            tracing::warn!(error = %err, "failed to persist session");
        }
        tracing::info!(user_id = %identity.id, username = %identity.username, "signed in");
        self.session = Some(Session {
            access_token: access_token.to_string(),
            identity: identity.clone(),
        });
        self.transition(FlowState::Authenticated);
        Ok(identity)
    }

    /// Forget the session in memory and on disk. Always succeeds.
    pub async fn logout(&mut self) {
        self.session = None;
        if let Err(err) = self.store.clear().await {
            tracing::warn!(error = %err, "failed to clear stored session");
        }
        self.transition(FlowState::Idle);
    }

    fn settle(&mut self) {
        let next = if self.session.is_some() {
            FlowState::Authenticated
        } else {
            FlowState::Idle
        };
        self.transition(next);
    }

    fn transition(&mut self, next: FlowState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "auth flow state");
            self.state = next;
        }
    }
}
