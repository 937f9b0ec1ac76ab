//! Error types for the Raindrop client and shell
//!
//! Every layer returns [`Error`]; the shell decides per variant whether to
//! re-prompt or abandon the current sub-flow.

use thiserror::Error;

/// Result type alias for client and shell operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Network failure, timeout, or the connection could not be established
    #[error("Network error: {0}")]
    Transport(String),

    /// The server answered with a 4xx/5xx status
    #[error("HTTP {status}: {}", summarize_body(.body))]
    HttpStatus { status: u16, body: String },

    /// The token refresh round trip failed
    #[error("Token refresh failed: {0}")]
    AuthRefresh(String),

    /// A collection title or id is not in the local snapshot
    #[error("Not found: {0}")]
    NotFoundLocal(String),

    /// User input rejected before any network call
    #[error("{0}")]
    Validation(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response or state file did not decode
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors the shell answers with a re-prompt rather than leaving the
    /// current sub-flow.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFoundLocal(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Raindrop error bodies look like `{"result":false,"errorMessage":"..."}`;
/// fall back to the raw text when they don't.
fn summarize_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["errorMessage", "error", "message"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "(empty body)".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
