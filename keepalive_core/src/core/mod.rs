pub mod connection_manager;
pub mod service;
pub mod status;
pub mod supervisor;

pub use connection_manager::{ConnectionManager, ConnectionManagerBuilder};
pub use service::KeepAliveService;
pub use status::{ConnectionState, StatusSnapshot};
pub use supervisor::{ReconnectPolicy, TransportEvent, NOTIFY_EVENT};
