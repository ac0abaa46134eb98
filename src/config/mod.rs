//! Configuration (layered: code > env > `.env` file > defaults).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use reqwest::Url;

use crate::error::{AppError, Result};

pub const DEFAULT_AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api";
pub const DEFAULT_CDN_BASE_URL: &str = "https://cdn.discordapp.com";
/// Fixed application scheme the redirect target is derived from.
pub const APP_SCHEME: &str = "discordauthapp";
pub const DEFAULT_REDIRECT_URI: &str = "discordauthapp://redirect";
pub const DEFAULT_SCOPE: &str = "identify";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Avatar shown when the identity carries no avatar hash.
pub const DEFAULT_AVATAR_URL: &str = "https://yt3.googleusercontent.com/vRF8BHREiJ3Y16AbMxEi_oEuoQlnNNqGpgULuZ6zrWSAi24HcxX3Vko42RN8ToctH-G0qlWd=s160-c-k-c0x00ffffff-no-rj";

/// Identity provider endpoints and client credentials.
///
/// # Example
/// ```
/// use discord_session::config::ProviderConfig;
///
/// let config = ProviderConfig::builder()
///     .client_id("1234")
///     .client_secret("shh")
///     .build();
/// assert_eq!(config.user_url(), "https://discord.com/api/users/@me");
/// ```
#[derive(Clone, Builder)]
pub struct ProviderConfig {
    #[builder(into)]
    pub client_id: String,
    #[builder(into)]
    pub client_secret: String,
    #[builder(into, default = DEFAULT_AUTHORIZE_URL.to_string())]
    pub authorize_url: String,
    #[builder(into, default = DEFAULT_TOKEN_URL.to_string())]
    pub token_url: String,
    #[builder(into, default = DEFAULT_API_BASE_URL.to_string())]
    pub api_base_url: String,
    #[builder(into, default = DEFAULT_CDN_BASE_URL.to_string())]
    pub cdn_base_url: String,
    #[builder(into, default = DEFAULT_REDIRECT_URI.to_string())]
    pub redirect_uri: String,
    #[builder(default = vec![DEFAULT_SCOPE.to_string()])]
    pub scopes: Vec<String>,
    #[builder(default = Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))]
    pub http_timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("cdn_base_url", &self.cdn_base_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// The provider's "current user" endpoint.
    pub fn user_url(&self) -> String {
        format!("{}/users/@me", self.api_base_url.trim_end_matches('/'))
    }

    /// Space-separated scope string sent to the authorize endpoint.
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Check that every endpoint parses as an absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AppError::Configuration("client id is empty".into()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AppError::Configuration("client secret is empty".into()));
        }
        for (name, value) in [
            ("authorize url", &self.authorize_url),
            ("token url", &self.token_url),
            ("api base url", &self.api_base_url),
            ("cdn base url", &self.cdn_base_url),
            ("redirect uri", &self.redirect_uri),
        ] {
            Url::parse(value).map_err(|e| {
                AppError::Configuration(format!("invalid {name} '{value}': {e}"))
            })?;
        }
        Ok(())
    }
}

/// Everything the application needs at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    /// Directory holding the persisted session file.
    pub session_dir: PathBuf,
    /// Open the authorization URL in the system browser, not just print it.
    pub open_browser: bool,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| AppError::Configuration(format!("{key} is not set")))
        };

        let http_timeout = match get("DISCORD_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    AppError::Configuration(format!(
                        "DISCORD_HTTP_TIMEOUT_SECS must be a number of seconds: {e}"
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let provider = ProviderConfig::builder()
            .client_id(required("DISCORD_CLIENT_ID")?)
            .client_secret(required("DISCORD_CLIENT_SECRET")?)
            .maybe_authorize_url(get("DISCORD_AUTHORIZE_URL"))
            .maybe_token_url(get("DISCORD_TOKEN_URL"))
            .maybe_api_base_url(get("DISCORD_API_BASE_URL"))
            .maybe_cdn_base_url(get("DISCORD_CDN_BASE_URL"))
            .maybe_redirect_uri(get("DISCORD_REDIRECT_URI"))
            .http_timeout(http_timeout)
            .build();
        provider.validate()?;

        let session_dir = get("DISCORD_SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_session_dir);

        let open_browser = match get("DISCORD_OPEN_BROWSER") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                AppError::Configuration(format!(
                    "DISCORD_OPEN_BROWSER must be true or false, got '{raw}'"
                ))
            })?,
            None => true,
        };

        Ok(Self {
            provider,
            session_dir,
            open_browser,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Platform data directory for the session file.
pub fn default_session_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "discord-session")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".discord-session"))
}
