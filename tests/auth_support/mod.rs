#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use discord_session::auth::{
    AuthController, AuthError, AuthorizationRequest, BrowserLauncher, MemoryKeyValueStore,
    ProviderClient, RedirectOutcome, SessionStore,
};
use discord_session::config::ProviderConfig;
use reqwest::Url;
use wiremock::MockServer;

/// What the scripted browser hands back after "showing" the consent page.
#[derive(Debug, Clone)]
pub enum Script {
    /// Redirect with `code` and the state the request carried.
    Approve(String),
    /// Return this outcome verbatim.
    Return(RedirectOutcome),
}

/// Launcher that never opens anything and answers from a script.
pub struct ScriptedBrowser {
    script: Script,
    seen: Mutex<Vec<Url>>,
}

impl ScriptedBrowser {
    pub fn approving(code: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Approve(code.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn returning(outcome: RedirectOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Return(outcome),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Authorization URLs this launcher was asked to open.
    pub fn seen(&self) -> Vec<Url> {
        self.seen.lock().expect("seen lock poisoned").clone()
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedBrowser {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<RedirectOutcome, AuthError> {
        let url = request.url()?;
        self.seen.lock().expect("seen lock poisoned").push(url);
        Ok(match &self.script {
            Script::Approve(code) => RedirectOutcome::Success {
                code: code.clone(),
                state: Some(request.state.clone()),
            },
            Script::Return(outcome) => outcome.clone(),
        })
    }
}

/// Provider config pointing every endpoint at `server`.
pub fn provider_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::builder()
        .client_id("client-123")
        .client_secret("secret-456")
        .authorize_url(format!("{}/oauth2/authorize", server.uri()))
        .token_url(format!("{}/api/oauth2/token", server.uri()))
        .api_base_url(format!("{}/api", server.uri()))
        .cdn_base_url(format!("{}/cdn", server.uri()))
        .build()
}

/// Controller wired to `server`, `launcher` and an in-memory store.
pub fn controller(
    server: &MockServer,
    launcher: Arc<dyn BrowserLauncher>,
) -> (AuthController, Arc<MemoryKeyValueStore>) {
    controller_with(provider_config(server), launcher)
}

/// Controller for an explicit provider config and an in-memory store.
pub fn controller_with(
    config: ProviderConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> (AuthController, Arc<MemoryKeyValueStore>) {
    let backend = Arc::new(MemoryKeyValueStore::new());
    let auth = AuthController::new(
        ProviderClient::new(config).expect("provider client"),
        launcher,
        SessionStore::new(backend.clone()),
    );
    (auth, backend)
}
