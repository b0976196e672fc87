use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};

use super::status::{ActivityEntry, ConnectionState, ErrorUpdate, StatusBoard, StatusSnapshot};
use super::supervisor::{EventHook, LiveConnection, ReconnectPolicy, TransportEvent};
use crate::connections::socketio::SocketIoConnector;
use crate::connections::{Connector, SessionIdentity};
use crate::notify::{DeliveryOutcome, NotificationPipeline};
use crate::platform::{
    LaunchResolver, NoPermissionRequired, Notifier, PermissionChecker, SamePackageLauncher,
};
use crate::storage::config::{redact, Configuration};

pub const DEFAULT_APP_NAME: &str = "Keepalive";
pub const DEFAULT_PACKAGE: &str = "keepalive";

/// Session identity plus the handle of the connection bound to it.
///
/// Only ever touched with the manager's lock held.
#[derive(Default)]
struct Inner {
    session: Option<SessionIdentity>,
    live: Option<LiveConnection>,
}

/// Owns the single notification connection.
///
/// `refresh` decides whether to leave the connection alone, tear it down or
/// (re)establish it. One async mutex covers "read session, decide, mutate,
/// start or cancel", so concurrent refreshes from unrelated call sites can
/// never end up with two live connections. Status is published separately
/// and can be read at any time without that lock.
///
/// Cloning is cheap: clones share the same connection and status.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Mutex<Inner>>,
    status: Arc<StatusBoard>,
    pipeline: Arc<NotificationPipeline>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    /// Bumped on every teardown; hooks from older generations are ignored.
    generation: Arc<AtomicU64>,
}

pub struct ConnectionManagerBuilder {
    notifier: Arc<dyn Notifier>,
    connector: Arc<dyn Connector>,
    permissions: Arc<dyn PermissionChecker>,
    launcher: Arc<dyn LaunchResolver>,
    policy: ReconnectPolicy,
    app_name: String,
    package: String,
}

impl ConnectionManagerBuilder {
    /// Defaults to the Socket.IO transport.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn LaunchResolver>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Default notification title.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Host package identity handed to the launch resolver.
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn build(self) -> ConnectionManager {
        let pipeline = NotificationPipeline::new(
            self.notifier,
            self.permissions,
            self.launcher,
            self.app_name,
            self.package,
        );
        ConnectionManager {
            inner: Arc::new(Mutex::new(Inner::default())),
            status: Arc::new(StatusBoard::new()),
            pipeline: Arc::new(pipeline),
            connector: self.connector,
            policy: self.policy,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ConnectionManager {
    pub fn builder(notifier: Arc<dyn Notifier>) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder {
            notifier,
            connector: Arc::new(SocketIoConnector),
            permissions: Arc::new(NoPermissionRequired),
            launcher: Arc::new(SamePackageLauncher),
            policy: ReconnectPolicy::default(),
            app_name: DEFAULT_APP_NAME.to_string(),
            package: DEFAULT_PACKAGE.to_string(),
        }
    }

    /// Re-evaluates the connection against `config`.
    ///
    /// Returns once the decision is made; connecting happens in the
    /// background and shows up through [`subscribe`](Self::subscribe).
    pub async fn refresh(&self, config: &Configuration) {
        let base = config.base_endpoint.trim();
        let path = config.sub_path.trim();
        let token = config.token.trim();

        let mut inner = self.inner.lock().await;

        if base.is_empty() {
            self.teardown(&mut inner).await;
            self.status.transition(
                ConnectionState::Disabled,
                ErrorUpdate::Set("missing endpoint".into()),
            );
            return;
        }

        if token.is_empty() {
            self.teardown(&mut inner).await;
            self.status.transition(
                ConnectionState::WaitingToken,
                ErrorUpdate::Set("missing token".into()),
            );
            return;
        }

        let identity = SessionIdentity::new(base, path, token);
        let alive = inner.live.as_ref().is_some_and(LiveConnection::is_alive);
        if alive && inner.session.as_ref() == Some(&identity) {
            debug!("Refresh with unchanged config; keeping the live connection");
            self.status.set_state_quietly(ConnectionState::Connected);
            return;
        }

        self.teardown(&mut inner).await;
        info!(
            "Binding session {}{} (token {})",
            identity.base_endpoint,
            identity.path,
            redact(&identity.token)
        );
        inner.session = Some(identity.clone());
        self.status
            .transition(ConnectionState::Connecting, ErrorUpdate::Clear);
        self.pipeline.ensure_channel();

        let generation = self.generation.load(Ordering::SeqCst);
        let hook = self.event_hook(generation);
        inner.live = Some(LiveConnection::spawn(
            identity,
            self.connector.clone(),
            self.policy.clone(),
            hook,
        ));
    }

    /// Tears down the live connection, if any. Never fails.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        self.teardown(&mut inner).await;
    }

    pub fn status_text(&self) -> String {
        self.status.snapshot().state.label()
    }

    pub fn last_error(&self) -> String {
        self.status.snapshot().last_error
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    pub fn recent_activity(&self) -> Vec<ActivityEntry> {
        self.status.activity()
    }

    /// Whether a connection is live right now. Takes the manager lock.
    pub async fn is_connected(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.live.as_ref().is_some_and(LiveConnection::is_alive)
    }

    async fn teardown(&self, inner: &mut Inner) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(live) = inner.live.take() {
            debug!("Tearing down the live connection");
            live.shutdown().await;
            self.status.note("connection torn down");
        }
    }

    fn event_hook(&self, generation: u64) -> EventHook {
        let status = self.status.clone();
        let pipeline = self.pipeline.clone();
        let current = self.generation.clone();
        Arc::new(move |event: TransportEvent| {
            if current.load(Ordering::SeqCst) != generation {
                debug!("Dropping {:?} from a superseded connection", event);
                return;
            }
            dispatch(&status, &pipeline, event);
        })
    }
}

fn dispatch(status: &StatusBoard, pipeline: &NotificationPipeline, event: TransportEvent) {
    match event {
        TransportEvent::Connected => {
            pipeline.ensure_channel();
            status.transition(ConnectionState::Connected, ErrorUpdate::Clear);
        }
        TransportEvent::ConnectError(detail) => {
            let error = match detail {
                Some(detail) => ErrorUpdate::Set(detail),
                None => ErrorUpdate::Keep,
            };
            status.transition(ConnectionState::ConnectError, error);
        }
        TransportEvent::Disconnected(reason) => {
            status.note(format!("disconnected: {reason}"));
            status.transition(ConnectionState::Disconnected, ErrorUpdate::Keep);
        }
        TransportEvent::Message(payload) => match pipeline.deliver(&payload) {
            DeliveryOutcome::Posted { id, message } => {
                status.note(format!("notification {id}: {}", message.title));
            }
            DeliveryOutcome::NoPermission => status.transition(
                ConnectionState::NoPermission,
                ErrorUpdate::Set("notification permission not granted".into()),
            ),
            DeliveryOutcome::NotificationsDisabled => status.transition(
                ConnectionState::NotificationsDisabled,
                ErrorUpdate::Set("notifications disabled for app".into()),
            ),
            DeliveryOutcome::Failed(e) => {
                warn!("Posting notification failed: {}", e);
                status.transition(ConnectionState::NotifyError, ErrorUpdate::Set(e.to_string()));
            }
        },
    }
}
