//! Library error types.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Every failure is scoped to a single request: a failed fetch never
/// modifies accumulated feed state, and a subsequent user-triggered retry
/// (changing a filter, loading more) is always valid.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure from the HTTP client.
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the JSON we expected.
    #[error("malformed response body")]
    Json(#[from] serde_json::Error),

    /// A required key was absent from an otherwise well-formed body.
    #[error("missing '{0}' in response")]
    MissingField(&'static str),

    /// Configuration could not be loaded.
    #[error("configuration error")]
    Config(#[from] anyhow::Error),
}

/// Result type alias using the engine [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
