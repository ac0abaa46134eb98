//! Error types for the application shell.

use thiserror::Error;

/// Errors that stop the application from starting or running.
///
/// Login-flow failures never surface here; the controller logs them and
/// keeps the session consistent. This type covers configuration and
/// terminal I/O around the flow.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Short hint shown under the error when the app fails to start.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            Self::Configuration(_) => {
                Some("Set DISCORD_CLIENT_ID and DISCORD_CLIENT_SECRET in the environment or a .env file")
            }
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_has_help_text() {
        let err = AppError::Configuration("DISCORD_CLIENT_ID is not set".into());
        assert!(err.help().unwrap().contains("DISCORD_CLIENT_ID"));
        assert!(err.to_string().contains("DISCORD_CLIENT_ID is not set"));
    }

    #[test]
    fn auth_error_converts_into_app_error() {
        let err: AppError = crate::auth::AuthError::Transport("connection refused".into()).into();
        assert!(matches!(err, AppError::Auth(ref msg) if msg.contains("connection refused")));
        assert!(err.help().is_none());
    }

    #[test]
    fn auth_configuration_error_maps_to_configuration() {
        let err: AppError = crate::auth::AuthError::Configuration("bad redirect".into()).into();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
