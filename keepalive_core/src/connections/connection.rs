use super::errors::ConnectionError;
use async_trait::async_trait;
use serde_json::Value;

/// Sub-path used when the stored configuration leaves it blank.
pub const DEFAULT_SUB_PATH: &str = "/api/notify";

/// The `(endpoint, path, token)` tuple a live connection is bound to.
///
/// Two identities compare equal only when all three fields match, which is
/// what lets the manager skip reconnecting on a refresh that changed nothing.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub base_endpoint: String,
    pub path: String,
    pub token: String,
}

impl SessionIdentity {
    /// Builds an identity from already-trimmed values. A blank path falls
    /// back to [`DEFAULT_SUB_PATH`].
    pub fn new(base_endpoint: &str, path: &str, token: &str) -> Self {
        let path = if path.is_empty() { DEFAULT_SUB_PATH } else { path };
        Self {
            base_endpoint: base_endpoint.to_string(),
            path: path.to_string(),
            token: token.to_string(),
        }
    }
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("base_endpoint", &self.base_endpoint)
            .field("path", &self.path)
            .field("token", &crate::storage::config::redact(&self.token))
            .finish()
    }
}

/// What a connected stream can hand back to its reader.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// A named server event with its first argument (or `Null`).
    Event { name: String, payload: Value },
    /// The stream ended; the string is the disconnect reason.
    Disconnected(String),
}

/// A single connection attempt to the notification backend.
///
/// Implementations are created *not yet connected*; the supervisor calls
/// `connect`, then pulls events until the stream ends or it is cancelled,
/// and always finishes with `disconnect`.
#[async_trait]
pub trait Connection: Send {
    /// Performs the transport and namespace handshake.
    async fn connect(&mut self) -> Result<(), ConnectionError>;
    /// Requests a graceful close. Must be safe to call more than once and
    /// on a connection that never connected.
    async fn disconnect(&mut self) -> Result<(), ConnectionError>;
    /// Waits for the next server event.
    async fn next_event(&mut self) -> Result<SocketEvent, ConnectionError>;
}

/// Produces a fresh [`Connection`] for every (re)connection attempt.
pub trait Connector: Send + Sync {
    fn create(&self, identity: &SessionIdentity) -> Box<dyn Connection>;
}
