//! Errors raised by the provider engine and its transport seam.

use thiserror::Error;

/// Errors returned by a [`Transport`](super::Transport).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    /// Connection refused, DNS failure, TLS error, reset...
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// The HTTP status carried by the error, when there is a usable one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } if *status > 0 => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Errors that abort a whole provider run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Token retrieval failed for {provider}: {reason}")]
    Token { provider: String, reason: String },

    /// Every request of a run failed without an HTTP status.
    #[error("Provider {provider} unreachable: {reason}")]
    Unreachable { provider: String, reason: String },
}

impl EngineError {
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Errors without a concrete HTTP status usually mean the mirror is
    /// blocked or down; only these trigger fallback rotation.
    pub fn is_likely_blocked(&self) -> bool {
        self.status().is_none()
    }
}

/// Errors compiling an HTML extraction rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("Invalid selector '{selector}' for {field}: {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("Invalid regex '{pattern}' for {field}: {reason}")]
    InvalidRegex {
        field: String,
        pattern: String,
        reason: String,
    },
}
