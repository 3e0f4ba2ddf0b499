//! Error taxonomy
//!
//! Every failure surfaced by the client core maps to one [`Error`] variant.
//! Discovery-phase failures never reach callers; they are logged and the
//! affected API surface is left out of the catalog.

use serde::Deserialize;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Status payload returned by the server alongside non-2xx responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
}

impl Status {
    /// Decode a status payload, falling back to the raw body as the message
    pub fn from_body(code: u16, body: &str) -> Self {
        match serde_json::from_str::<Status>(body) {
            Ok(mut status) if !status.message.is_empty() || !status.reason.is_empty() => {
                if status.code == 0 {
                    status.code = code;
                }
                status
            }
            _ => Self {
                code,
                message: body.to_string(),
                reason: String::new(),
            },
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{} {}", self.code, self.message)
        } else {
            write!(f, "{} {} ({})", self.code, self.message, self.reason)
        }
    }
}

/// Errors raised by the catalog, address builder and request router
#[derive(Debug, Error)]
pub enum Error {
    /// No discovered endpoint matches the requested kind and version.
    #[error("Unsupported endpoint: kind {kind} version {}", version.as_deref().unwrap_or("<any>"))]
    UnsupportedEndpoint {
        kind: String,
        version: Option<String>,
    },

    /// The verb/kind combination is structurally disallowed.
    #[error("Unsupported operation: {verb} on {kind}")]
    UnsupportedOperation { verb: String, kind: String },

    /// The request never produced a response.
    #[error("Transport failure for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered 401.
    #[error("Unauthorized for {url}: {message}")]
    Unauthorized { url: String, message: String },

    /// The server answered 403.
    #[error("Forbidden for {url}: {message}")]
    Forbidden { url: String, message: String },

    /// Any other non-2xx answer.
    #[error("Server rejected request to {url}: {status}")]
    ServerRejection { url: String, status: Status },

    /// Client misuse or invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The response body could not be turned into the requested representation.
    #[error("Failed to materialize response: {0}")]
    Materialization(#[from] serde_json::Error),
}

impl Error {
    /// Map a non-2xx response into the matching variant
    pub fn from_response(url: &str, code: u16, body: &str) -> Self {
        let status = Status::from_body(code, body);
        match code {
            401 => Error::Unauthorized {
                url: url.to_string(),
                message: status.message,
            },
            403 => Error::Forbidden {
                url: url.to_string(),
                message: status.message,
            },
            _ => Error::ServerRejection {
                url: url.to_string(),
                status,
            },
        }
    }

    /// HTTP status code carried by server-side errors
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { .. } => Some(401),
            Error::Forbidden { .. } => Some(403),
            Error::ServerRejection { status, .. } => Some(status.code),
            _ => None,
        }
    }

    /// True for a 404 rejection
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}
