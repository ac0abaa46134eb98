//! Convenience re-exports for common use.

pub use crate::auth::{
    shared_input, AuthController, AuthError, BrowserLauncher, ConsoleBrowser, FileKeyValueStore,
    FlowState, Identity, LoginOutcome, LoopbackBrowser, ProviderClient, Session, SessionStore,
    UrlOpener,
};
pub use crate::config::{AppConfig, ProviderConfig};
pub use crate::error::{AppError, Result};
