use anyhow::Result;
use keepalive_core::{ConfigStore, ConnectionState, KeepAliveService};

mod common;
use common::{harness, wait_for_state};

#[tokio::test]
async fn setters_persist_then_refresh() -> Result<()> {
    let h = harness();
    let dir = tempfile::tempdir()?;
    let service = KeepAliveService::new(ConfigStore::with_dir(dir.path())?, h.manager.clone());
    let mut rx = h.manager.subscribe();

    service.start().await;
    assert_eq!(h.manager.status().state, ConnectionState::Disabled);

    service
        .set_notify_config(Some("https://push.example.org"), None)
        .await?;
    assert_eq!(h.manager.status().state, ConnectionState::WaitingToken);
    assert_eq!(service.store().get().sub_path, "/api/notify");

    service.set_notify_token(Some("tok")).await?;
    wait_for_state(&mut rx, ConnectionState::Connected).await;
    assert_eq!(h.connector.identity(0).token, "tok");

    // A second store on the same directory sees what the service wrote.
    let reopened = ConfigStore::with_dir(dir.path())?.get();
    assert_eq!(reopened.base_endpoint, "https://push.example.org");
    assert_eq!(reopened.token, "tok");

    service.set_notify_token(None).await?;
    assert_eq!(h.manager.status().state, ConnectionState::WaitingToken);
    assert_eq!(h.connector.disconnects(0), 1);
    assert!(service.store().get().token.is_empty());

    service.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn restart_reuses_the_stored_session() -> Result<()> {
    let h = harness();
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::with_dir(dir.path())?;
    store.set_config(Some("https://push.example.org"), Some("/api/notify"))?;
    store.set_token(Some("tok"))?;
    let service = KeepAliveService::new(store, h.manager.clone());
    let mut rx = h.manager.subscribe();

    service.start().await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;
    service.start().await;
    service.refresh().await;

    assert_eq!(h.connector.created(), 1, "unchanged config never reconnects");
    service.shutdown().await;
    assert!(!h.manager.is_connected().await);
    Ok(())
}
