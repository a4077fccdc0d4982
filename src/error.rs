//! Error types for the Relay trading agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Secret \"{name}\" not found in workspace (available: {})", .available.join(", "))]
    SecretNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Could not find token address for \"{0}\"")]
    TokenNotFound(String),

    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Unsupported route: {0}")]
    UnsupportedRoute(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure classes reported to callers of `trade_token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigurationError,
    ResolutionFailure,
    UpstreamError,
    ValidationError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::SecretNotFound { .. } | Error::Wallet(_) => {
                ErrorKind::ConfigurationError
            }
            Error::TokenNotFound(_) => ErrorKind::ResolutionFailure,
            Error::InvalidArgument(_) => ErrorKind::ValidationError,
            Error::Upstream { .. }
            | Error::Execution(_)
            | Error::UnsupportedRoute(_)
            | Error::Timeout(_)
            | Error::Network(_)
            | Error::Json(_)
            | Error::Io(_) => ErrorKind::UpstreamError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_not_found_lists_names() {
        let err = Error::SecretNotFound {
            name: "relay_key".to_string(),
            available: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Secret \"relay_key\" not found in workspace (available: a, b)"
        );
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(
            Error::TokenNotFound("X".into()).kind(),
            ErrorKind::ResolutionFailure
        );
        assert_eq!(
            Error::InvalidArgument("x".into()).kind(),
            ErrorKind::ValidationError
        );
        let upstream = Error::Upstream {
            service: "relay",
            status: 400,
            message: "bad".into(),
        };
        assert_eq!(upstream.kind(), ErrorKind::UpstreamError);
        assert_eq!(upstream.to_string(), "relay returned 400: bad");
    }
}
