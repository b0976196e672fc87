pub mod config;
pub mod store;

pub use config::Configuration;
pub use store::{ConfigStore, StoreError};
