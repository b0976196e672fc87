pub mod connections;
pub mod core;
pub mod notify;
pub mod platform;
pub mod storage;
pub mod utils;

// re‑export ergonomic entry points
pub use crate::core::connection_manager::{ConnectionManager, ConnectionManagerBuilder};
pub use crate::core::service::KeepAliveService;
pub use crate::core::status::{ConnectionState, StatusSnapshot};
pub use storage::{ConfigStore, Configuration};
