use log::info;

use super::connection_manager::ConnectionManager;
use crate::storage::{ConfigStore, StoreError};

/// Glue between the persisted configuration and the connection manager.
///
/// Every setter persists first and then refreshes, so the manager always
/// acts on what is actually on disk.
pub struct KeepAliveService {
    store: ConfigStore,
    manager: ConnectionManager,
}

impl KeepAliveService {
    pub fn new(store: ConfigStore, manager: ConnectionManager) -> Self {
        Self { store, manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// (Re)start: apply whatever is stored.
    pub async fn start(&self) {
        info!("Starting notification service");
        self.refresh().await;
    }

    /// Re-reads the store and hands it to the manager.
    pub async fn refresh(&self) {
        let config = self.store.get();
        self.manager.refresh(&config).await;
    }

    pub async fn set_notify_config(
        &self,
        base_endpoint: Option<&str>,
        sub_path: Option<&str>,
    ) -> Result<(), StoreError> {
        self.store.set_config(base_endpoint, sub_path)?;
        self.refresh().await;
        Ok(())
    }

    pub async fn set_notify_token(&self, token: Option<&str>) -> Result<(), StoreError> {
        self.store.set_token(token)?;
        self.refresh().await;
        Ok(())
    }

    pub async fn shutdown(&self) {
        info!("Stopping notification service");
        self.manager.stop().await;
    }
}
