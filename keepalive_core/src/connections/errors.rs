use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// A central error enum for connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// The server answered the namespace CONNECT with CONNECT_ERROR.
    #[error("Connection rejected: {}", .0.as_deref().unwrap_or("no detail"))]
    Rejected(Option<String>),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Connection closed")]
    Closed,
    #[error("Other error: {0}")]
    Other(String),
}

impl ConnectionError {
    /// Best-effort human readable detail, as surfaced through `last_error`.
    ///
    /// A rejection without a message carries no detail at all, so callers can
    /// leave the previous error text in place.
    pub fn detail(&self) -> Option<String> {
        match self {
            ConnectionError::Rejected(detail) => detail.clone(),
            other => Some(other.to_string()),
        }
    }
}

/// Convert from tungstenite::Error.
/// Boxed because the tungstenite error is several hundred bytes wide.
impl From<tungstenite::Error> for ConnectionError {
    fn from(err: tungstenite::Error) -> Self {
        ConnectionError::WebSocket(Box::new(err))
    }
}

impl From<url::ParseError> for ConnectionError {
    fn from(err: url::ParseError) -> Self {
        ConnectionError::InvalidEndpoint(err.to_string())
    }
}
