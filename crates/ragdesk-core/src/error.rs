//! Error type for talking to the RAG backend.

use reqwest::StatusCode;

/// Errors produced by [`crate::RagClient`] and the stream decoder.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network failure or a body that could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// The backend answered 2xx but reported an error in the body.
    #[error("{0}")]
    Server(String),

    /// A streamed `data:` payload (or a JSON response) could not be parsed.
    #[error("invalid payload {payload:?}: {source}")]
    Decode {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The caller cancelled the request. Never shown to the user.
    #[error("request aborted")]
    Aborted,
}

impl ClientError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ClientError::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
