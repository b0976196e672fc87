pub mod connection;
pub mod errors;
pub mod socketio;

pub use connection::{Connection, Connector, SessionIdentity, SocketEvent, DEFAULT_SUB_PATH};
pub use errors::ConnectionError;
