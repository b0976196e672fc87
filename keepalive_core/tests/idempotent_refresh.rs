use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{sleep, timeout};
use keepalive_core::{ConnectionState, Configuration};

mod common;
use common::{harness, wait_for_state};

const ENDPOINT: &str = "https://push.example.org";

#[tokio::test]
async fn unchanged_config_keeps_the_live_connection() {
    let h = harness();
    let mut rx = h.manager.subscribe();
    let config = Configuration::new(ENDPOINT, "/api/notify", "tok");

    h.manager.refresh(&config).await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;

    for _ in 0..5 {
        h.manager.refresh(&config).await;
    }
    // Surrounding whitespace does not make it a different session.
    h.manager
        .refresh(&Configuration::new(" https://push.example.org ", "/api/notify ", "tok"))
        .await;

    assert_eq!(h.connector.created(), 1);
    assert_eq!(h.connector.disconnects(0), 0);
    assert_eq!(h.manager.status().state, ConnectionState::Connected);
}

#[tokio::test]
async fn changed_token_replaces_the_connection_in_order() {
    let h = harness();
    let mut rx = h.manager.subscribe();

    h.manager
        .refresh(&Configuration::new(ENDPOINT, "/api/notify", "old"))
        .await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;

    h.manager
        .refresh(&Configuration::new(ENDPOINT, "/api/notify", "new"))
        .await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;
    common::wait_until("second connect", || h.connector.journal().len() == 5).await;

    assert_eq!(
        h.connector.journal(),
        vec!["create #0", "connect #0", "disconnect #0", "create #1", "connect #1"]
    );
    assert_eq!(h.connector.disconnects(0), 1, "old connection torn down exactly once");
    assert_eq!(h.connector.disconnects(1), 0);
    assert_eq!(h.connector.identity(1).token, "new");
}

#[tokio::test]
async fn changed_path_replaces_the_connection() {
    let h = harness();
    let mut rx = h.manager.subscribe();

    h.manager
        .refresh(&Configuration::new(ENDPOINT, "/api/notify", "tok"))
        .await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;
    h.manager
        .refresh(&Configuration::new(ENDPOINT, "/api/other", "tok"))
        .await;

    assert_eq!(h.connector.created(), 2);
    assert_eq!(h.connector.disconnects(0), 1);
    assert_eq!(h.connector.identity(1).path, "/api/other");
}

#[tokio::test]
async fn concurrent_refreshes_leave_exactly_one_connection() {
    let h = harness();

    let configs: Vec<_> = (0..8)
        .map(|i| Configuration::new(ENDPOINT, "/api/notify", &format!("tok-{i}")))
        .collect();
    join_all(configs.iter().map(|config| h.manager.refresh(config))).await;

    let created = h.connector.created();
    assert_eq!(created, configs.len(), "every distinct token binds a new session");
    let live: Vec<_> = (0..created)
        .filter(|&i| h.connector.disconnects(i) == 0)
        .collect();
    assert_eq!(live.len(), 1, "exactly one connection may survive");
    assert_eq!(live[0], created - 1, "the survivor is the last one created");
    for i in 0..created - 1 {
        assert_eq!(h.connector.disconnects(i), 1, "connection {i} torn down once");
    }

    let mut rx = h.manager.subscribe();
    wait_for_state(&mut rx, ConnectionState::Connected).await;
}

#[tokio::test]
async fn refresh_replaces_a_connection_whose_task_died() {
    let h = harness();
    let mut rx = h.manager.subscribe();
    let config = Configuration::new(ENDPOINT, "/api/notify", "tok");

    h.manager.refresh(&config).await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;

    h.connector.crash(0);
    let snapshot = wait_for_state(&mut rx, ConnectionState::Disconnected).await;
    assert_eq!(h.manager.status_text(), "notify: disconnected");
    assert!(snapshot.last_event_at.is_some());
    timeout(Duration::from_secs(2), async {
        while h.manager.is_connected().await {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dead task still reported as connected");

    h.manager.refresh(&config).await;
    wait_for_state(&mut rx, ConnectionState::Connected).await;
    assert_eq!(h.connector.created(), 2, "a dead task must not short-circuit refresh");
    assert!(h.manager.is_connected().await);
}
