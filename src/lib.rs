//! discord-session — sign in with Discord from a terminal.
//!
//! Runs the OAuth2 authorization-code flow with PKCE against a single
//! identity provider, keeps the resulting access token and identity in a
//! local session file, and restores them on the next start.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use discord_session::prelude::*;
//!
//! # async fn example() -> discord_session::error::Result<()> {
//! let config = AppConfig::from_env()?;
//! let input = shared_input(tokio::io::BufReader::new(tokio::io::stdin()));
//! let store = SessionStore::new(Arc::new(FileKeyValueStore::new(&config.session_dir)));
//! let mut auth = AuthController::new(
//!     ProviderClient::new(config.provider.clone())?,
//!     Arc::new(ConsoleBrowser::new(input)),
//!     store,
//! );
//!
//! if !auth.restore_session().await {
//!     auth.begin_login().await;
//! }
//! if let Some(identity) = auth.identity() {
//!     println!("Hello, {}", identity.display_name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod view;
