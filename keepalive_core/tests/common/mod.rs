#![allow(dead_code)]

pub mod fake_connection;
pub mod fake_platform;

use std::sync::Arc;
use std::time::Duration;

use keepalive_core::core::ReconnectPolicy;
use keepalive_core::{ConnectionManager, ConnectionState, StatusSnapshot};
use log::LevelFilter;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};

use fake_connection::FakeConnector;
use fake_platform::{RecordingNotifier, SwitchablePermission};

pub const APP_NAME: &str = "TestApp";
pub const PACKAGE: &str = "org.example.testapp";

/// Logs will appear only when you run with `-- --nocapture` or when the test fails.
pub fn init_test_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Millisecond-scale backoff so reconnect tests finish quickly.
pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        reconnection: true,
        max_attempts: None,
        delay: Duration::from_millis(10),
        delay_max: Duration::from_millis(40),
        connect_timeout: Duration::from_secs(1),
    }
}

pub struct Harness {
    pub manager: ConnectionManager,
    pub connector: Arc<FakeConnector>,
    pub notifier: Arc<RecordingNotifier>,
    pub permission: Arc<SwitchablePermission>,
}

pub fn harness() -> Harness {
    harness_with_policy(fast_policy())
}

pub fn harness_with_policy(policy: ReconnectPolicy) -> Harness {
    init_test_logging();
    let connector = FakeConnector::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let permission = Arc::new(SwitchablePermission::granted());
    let manager = ConnectionManager::builder(notifier.clone())
        .connector(connector.clone())
        .permissions(permission.clone())
        .policy(policy)
        .app_name(APP_NAME)
        .package(PACKAGE)
        .build();
    Harness {
        manager,
        connector,
        notifier,
        permission,
    }
}

/// Waits (bounded) until the published state equals `want`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<StatusSnapshot>,
    want: ConnectionState,
) -> StatusSnapshot {
    let snapshot = timeout(Duration::from_secs(2), rx.wait_for(|s| s.state == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {want}"))
        .expect("status channel closed unexpectedly");
    snapshot.clone()
}

/// Polls `cond` every few milliseconds; panics after two seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        sleep(Duration::from_millis(5)).await;
    }
}
