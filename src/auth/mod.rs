//! OAuth2 authorization-code + PKCE login, session persistence and
//! orchestration.

pub mod browser;
pub mod controller;
pub mod error;
pub mod identity;
pub mod pkce;
pub mod provider;
pub mod redirect;
pub mod request;
pub mod store;

pub use browser::{
    shared_input, BrowserLauncher, ConsoleBrowser, LoopbackBrowser, SharedInput, UrlOpener,
};
pub use controller::{AuthController, FlowState, LoginOutcome};
pub use error::AuthError;
pub use identity::{Identity, Session};
pub use pkce::PkcePair;
pub use provider::ProviderClient;
pub use redirect::RedirectOutcome;
pub use request::{AuthorizationRequest, PendingLogin};
pub use store::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SessionStore, StoredSession,
    ACCESS_TOKEN_KEY, IDENTITY_KEY,
};
