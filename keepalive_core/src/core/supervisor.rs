//! The live connection: one spawned task that keeps (re)connecting under a
//! [`ReconnectPolicy`] and reports what happens through a single hook.
//!
//! Teardown order matters. [`LiveConnection::shutdown`] first empties the hook
//! slot so no callback can fire for a session the manager has already
//! abandoned, then cancels the task, which disconnects the socket on its way
//! out.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::connections::{Connection, Connector, SessionIdentity, SocketEvent};

/// Name of the server event that carries a new message.
pub const NOTIFY_EVENT: &str = "notify.message";

/// Longest we wait for the task to finish closing during shutdown.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// The fixed vocabulary of things a transport reports.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    /// A connection attempt failed, with whatever detail was available.
    ConnectError(Option<String>),
    Disconnected(String),
    Message(Value),
}

pub type EventHook = Arc<dyn Fn(TransportEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub reconnection: bool,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry; doubles per consecutive failure.
    pub delay: Duration,
    pub delay_max: Duration,
    /// Budget for one full handshake.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            reconnection: true,
            max_attempts: None,
            delay: Duration::from_secs(1),
            delay_max: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(20),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.delay.saturating_mul(factor).min(self.delay_max)
    }
}

/// Where the supervisor task delivers events. Emptied on shutdown.
struct HookSlot(Mutex<Option<EventHook>>);

impl HookSlot {
    fn new(hook: EventHook) -> Self {
        Self(Mutex::new(Some(hook)))
    }

    /// The lock is held for the whole call, so `clear` returns only after
    /// an in-flight callback has finished.
    fn emit(&self, event: TransportEvent) {
        let slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(hook) => hook(event),
            None => debug!("Hook unregistered; dropping {:?}", event),
        }
    }

    fn clear(&self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

/// Handle to the single supervised connection task.
pub(crate) struct LiveConnection {
    hooks: Arc<HookSlot>,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl LiveConnection {
    pub(crate) fn spawn(
        identity: SessionIdentity,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        hook: EventHook,
    ) -> Self {
        let hooks = Arc::new(HookSlot::new(hook));
        let cancel = CancellationToken::new();
        let alive = Arc::new(AtomicBool::new(false));

        let supervisor = Supervisor {
            identity,
            connector,
            policy,
            hooks: hooks.clone(),
            cancel: cancel.clone(),
            alive: alive.clone(),
        };
        let (crash_hooks, crash_alive) = (hooks.clone(), alive.clone());
        let task = tokio::spawn(async move {
            if AssertUnwindSafe(supervisor.run()).catch_unwind().await.is_err() {
                crash_alive.store(false, Ordering::SeqCst);
                error!("Connection task panicked; connection lost");
                crash_hooks.emit(TransportEvent::Disconnected(
                    "connection task panicked".to_string(),
                ));
            }
        });

        Self {
            hooks,
            cancel,
            alive,
            task,
        }
    }

    /// True while a handshake has completed and the stream has not ended.
    /// A task that died without clearing the flag does not count.
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    pub(crate) async fn shutdown(self) {
        self.hooks.clear();
        self.cancel.cancel();
        let mut task = self.task;
        if timeout(TEARDOWN_TIMEOUT, &mut task).await.is_err() {
            warn!("Connection task did not stop in time; aborting it");
            task.abort();
        }
    }
}

struct Supervisor {
    identity: SessionIdentity,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    hooks: Arc<HookSlot>,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
}

/// How one connection attempt ended.
enum Attempt {
    Cancelled,
    Failed,
    /// Connected, then lost the stream.
    Dropped,
}

impl Supervisor {
    async fn run(self) {
        info!(
            "Connection task started for {}{}",
            self.identity.base_endpoint, self.identity.path
        );
        let mut failures = 0u32;
        loop {
            match self.attempt().await {
                Attempt::Cancelled => break,
                Attempt::Dropped => failures = 0,
                Attempt::Failed => {}
            }

            if !self.policy.reconnection {
                info!("Reconnection disabled; connection task exiting");
                break;
            }
            if let Some(max) = self.policy.max_attempts {
                if failures >= max {
                    warn!("Giving up after {} reconnection attempts", failures);
                    break;
                }
            }

            let delay = self.policy.backoff(failures);
            failures = failures.saturating_add(1);
            debug!("Reconnecting in {:?} (attempt {})", delay, failures);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }
        self.alive.store(false, Ordering::SeqCst);
        info!("Connection task ended");
    }

    async fn attempt(&self) -> Attempt {
        let mut conn = self.connector.create(&self.identity);

        let handshake = tokio::select! {
            _ = self.cancel.cancelled() => None,
            r = timeout(self.policy.connect_timeout, conn.connect()) => Some(r),
        };
        match handshake {
            None => {
                close(conn.as_mut()).await;
                return Attempt::Cancelled;
            }
            Some(Err(_elapsed)) => {
                close(conn.as_mut()).await;
                self.hooks
                    .emit(TransportEvent::ConnectError(Some("timeout".to_string())));
                return Attempt::Failed;
            }
            Some(Ok(Err(e))) => {
                debug!("Connect failed: {}", e);
                close(conn.as_mut()).await;
                self.hooks.emit(TransportEvent::ConnectError(e.detail()));
                return Attempt::Failed;
            }
            Some(Ok(Ok(()))) => {}
        }

        self.alive.store(true, Ordering::SeqCst);
        self.hooks.emit(TransportEvent::Connected);

        let reason = loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => None,
                ev = conn.next_event() => Some(ev),
            };
            match next {
                None => {
                    self.alive.store(false, Ordering::SeqCst);
                    close(conn.as_mut()).await;
                    return Attempt::Cancelled;
                }
                Some(Ok(SocketEvent::Event { name, payload })) if name == NOTIFY_EVENT => {
                    self.hooks.emit(TransportEvent::Message(payload));
                }
                Some(Ok(SocketEvent::Event { name, .. })) => {
                    debug!("Ignoring server event '{}'", name);
                }
                Some(Ok(SocketEvent::Disconnected(reason))) => break reason,
                Some(Err(e)) => break e.to_string(),
            }
        };

        self.alive.store(false, Ordering::SeqCst);
        close(conn.as_mut()).await;
        self.hooks.emit(TransportEvent::Disconnected(reason));
        Attempt::Dropped
    }
}

async fn close(conn: &mut dyn Connection) {
    if let Err(e) = conn.disconnect().await {
        debug!("Disconnect error: {}", e);
    }
}
