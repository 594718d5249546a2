//! Error types.

use thiserror::Error;

/// Errors produced while dispatching a request or decoding its response.
///
/// Transport, serialization and URL errors reject the dispatch itself.
/// `Parse` and `DestroyedConnection` only ever reject [`body()`], so the
/// status line and headers of the same response stay usable.
///
/// [`body()`]: crate::Response::body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Destroyed connection")]
    DestroyedConnection,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }

    /// Whether the error came from the network rather than from content.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
