pub mod packet;
pub mod socketio_connection;

pub use socketio_connection::{handshake_url, namespace_of, SocketIoConnection, SocketIoConnector};
