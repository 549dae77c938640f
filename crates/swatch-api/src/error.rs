use thiserror::Error;

/// Errors from a remote snapshot/audit store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}
