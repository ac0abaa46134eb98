//! External user-agent launchers that hand the redirect back to the app.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use reqwest::Url;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::error::AuthError;
use super::redirect::RedirectOutcome;
use super::request::AuthorizationRequest;

const DONE_PAGE: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><title>Signed in</title></head>\
<body style=\"background:#23272A;color:#fff;font-family:sans-serif;text-align:center;padding-top:20vh\">\
<h2>You can close this window and return to the app.</h2></body></html>";

/// Line-oriented input shared between the app's prompt and the launchers.
pub type SharedInput = Arc<Mutex<Box<dyn AsyncBufRead + Send + Unpin>>>;

/// Wrap a reader as [`SharedInput`].
pub fn shared_input<R>(reader: R) -> SharedInput
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    Arc::new(Mutex::new(Box::new(reader)))
}

/// How a launcher puts the authorization URL in front of the user.
///
/// The URL is always printed. `System` additionally opens it in the default
/// browser and reports a failure to do so as [`AuthError::LaunchFailed`].
#[derive(Debug, Clone, Copy, Default)]
pub enum UrlOpener {
    #[default]
    System,
    /// Print only, for headless sessions.
    PrintOnly,
    Custom(fn(&str) -> std::io::Result<()>),
}

impl UrlOpener {
    fn show(self, url: &Url) -> Result<(), AuthError> {
        println!("🔗 Open this URL in your browser:\n   {url}");
        let opened = match self {
            Self::System => open::that(url.as_str()),
            Self::PrintOnly => return Ok(()),
            Self::Custom(opener) => opener(url.as_str()),
        };
        opened.map_err(|e| AuthError::LaunchFailed(format!("could not open a browser: {e}")))
    }
}

/// Opens the authorization URL in a user-facing agent and waits for the
/// provider to redirect back.
///
/// Returns `Ok(RedirectOutcome::Cancelled)` (or `Err(AuthError::UserCancelled)`)
/// when the user backs out and `Err(AuthError::LaunchFailed)` when the agent
/// could not be started.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<RedirectOutcome, AuthError>;
}

/// Opens the URL, then reads the redirected-to URL pasted back by the user.
///
/// Works with any redirect URI, including custom app schemes the desktop
/// cannot route.
pub struct ConsoleBrowser {
    input: SharedInput,
    opener: UrlOpener,
}

impl ConsoleBrowser {
    pub fn new(input: SharedInput) -> Self {
        Self {
            input,
            opener: UrlOpener::default(),
        }
    }

    pub fn with_opener(mut self, opener: UrlOpener) -> Self {
        self.opener = opener;
        self
    }
}

#[async_trait]
impl BrowserLauncher for ConsoleBrowser {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<RedirectOutcome, AuthError> {
        let url = request.url().map_err(|e| AuthError::LaunchFailed(e.to_string()))?;
        self.opener.show(&url)?;
        println!("📋 After authorizing, paste the URL you were redirected to (empty line to cancel):");

        let mut line = String::new();
        let read = {
            let mut input = self.input.lock().await;
            input.read_line(&mut line).await
        };
        match read {
            Ok(0) => Ok(RedirectOutcome::Cancelled),
            Ok(_) if line.trim().is_empty() => Ok(RedirectOutcome::Cancelled),
            Ok(_) => Ok(RedirectOutcome::from_redirect_url(line.trim())),
            Err(err) => Err(AuthError::LaunchFailed(format!("failed to read redirect: {err}"))),
        }
    }
}

/// Receives the redirect on a loopback HTTP listener.
///
/// Used when the redirect URI is `http://127.0.0.1:<port>/...` or
/// `http://localhost:<port>/...`. The port is reserved by [`bind`] and
/// rebound for later attempts.
///
/// [`bind`]: LoopbackBrowser::bind
pub struct LoopbackBrowser {
    redirect_uri: Url,
    reserved: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    opener: UrlOpener,
}

impl LoopbackBrowser {
    /// Whether `redirect_uri` can be served by a loopback listener.
    pub fn supports(redirect_uri: &str) -> bool {
        Url::parse(redirect_uri)
            .map(|url| {
                url.scheme() == "http"
                    && matches!(url.host_str(), Some("127.0.0.1") | Some("localhost") | Some("[::1]"))
            })
            .unwrap_or(false)
    }

    /// Bind the listener for `redirect_uri` right away.
    pub async fn bind(redirect_uri: &str) -> Result<Self, AuthError> {
        if !Self::supports(redirect_uri) {
            return Err(AuthError::Configuration(format!(
                "redirect uri '{redirect_uri}' is not an http loopback address"
            )));
        }
        let redirect_uri = Url::parse(redirect_uri)
            .map_err(|e| AuthError::Configuration(format!("invalid redirect uri: {e}")))?;
        let host = redirect_uri.host_str().unwrap_or("127.0.0.1");
        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        let listener = TcpListener::bind((host.trim_matches(|c| c == '[' || c == ']'), port))
            .await
            .map_err(|e| AuthError::LaunchFailed(format!("cannot listen on {host}:{port}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AuthError::LaunchFailed(format!("redirect listener has no address: {e}")))?;
        tracing::debug!(%local_addr, "loopback redirect listener bound");
        Ok(Self {
            redirect_uri,
            reserved: Mutex::new(Some(listener)),
            local_addr,
            opener: UrlOpener::default(),
        })
    }

    pub fn with_opener(mut self, opener: UrlOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn listener(&self) -> Result<TcpListener, AuthError> {
        if let Some(listener) = self.reserved.lock().await.take() {
            return Ok(listener);
        }
        TcpListener::bind(self.local_addr).await.map_err(|e| {
            AuthError::LaunchFailed(format!("cannot listen on {}: {e}", self.local_addr))
        })
    }

    async fn wait_for_redirect(&self) -> Result<RedirectOutcome, AuthError> {
        let listener = self.listener().await?;
        let (sender, receiver) = oneshot::channel();
        let app = Router::new().fallback(handle_request).with_state(Callback {
            redirect_uri: self.redirect_uri.clone(),
            sender: Arc::new(Mutex::new(Some(sender))),
        });
        let server = ServerTask(Some(tokio::spawn(async move {
            axum::serve(listener, app).await
        })));

        let outcome = receiver.await;
        server.shutdown().await;
        outcome.map_err(|_| AuthError::LaunchFailed("redirect listener stopped".to_string()))
    }
}

#[async_trait]
impl BrowserLauncher for LoopbackBrowser {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<RedirectOutcome, AuthError> {
        let url = request.url().map_err(|e| AuthError::LaunchFailed(e.to_string()))?;
        self.opener.show(&url)?;
        println!("⏳ Waiting for the provider to redirect back...");
        self.wait_for_redirect().await
    }
}

#[derive(Clone)]
struct Callback {
    redirect_uri: Url,
    sender: Arc<Mutex<Option<oneshot::Sender<RedirectOutcome>>>>,
}

// Any path is routed here so the redirect path needs no route syntax.
async fn handle_request(State(callback): State<Callback>, method: Method, uri: Uri) -> Response {
    if uri.path() != callback.redirect_uri.path() {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let outcome = RedirectOutcome::from_request_target(&callback.redirect_uri, target);
    match callback.sender.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(outcome);
            Html(DONE_PAGE).into_response()
        }
        None => (StatusCode::GONE, "this sign-in attempt is already complete").into_response(),
    }
}

/// The spawned HTTP server; aborted when the attempt ends or is dropped.
struct ServerTask(Option<JoinHandle<std::io::Result<()>>>);

impl ServerTask {
    /// Stop the server and wait until the listener is closed.
    async fn shutdown(mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
            if let Ok(Err(err)) = handle.await {
                tracing::debug!(error = %err, "redirect listener failed");
            }
        }
    }
}

impl Drop for ServerTask {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
