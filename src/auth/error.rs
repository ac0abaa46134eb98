use thiserror::Error;

use crate::error::AppError;

/// Failure kinds of the login flow and session persistence.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization was cancelled by the user")]
    UserCancelled,
    #[error("Provider rejected the request: {0}")]
    ProviderRejected(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid redirect: {0}")]
    InvalidRedirect(String),
    #[error("Could not launch authorization: {0}")]
    LaunchFailed(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Whether this failure is the normal "user backed out" path.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Configuration(message) => AppError::Configuration(message),
            other => AppError::Auth(other.to_string()),
        }
    }
}
