use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::SystemTime;

use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// How many activity entries are kept before the oldest are dropped.
pub const ACTIVITY_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Init,
    /// No endpoint configured.
    Disabled,
    /// Endpoint configured, no token yet.
    WaitingToken,
    Connecting,
    Connected,
    Disconnected,
    ConnectError,
    NoPermission,
    NotificationsDisabled,
    NotifyError,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Init => "init",
            ConnectionState::Disabled => "disabled",
            ConnectionState::WaitingToken => "waitingToken",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::ConnectError => "connectError",
            ConnectionState::NoPermission => "noPermission",
            ConnectionState::NotificationsDisabled => "notificationsDisabled",
            ConnectionState::NotifyError => "notifyError",
        }
    }

    pub fn label(self) -> String {
        status_label(self.name())
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Short status line for a state name. Names without a dedicated label,
/// including ones this build does not know, render as `notify: <name>`.
pub fn status_label(state_name: &str) -> String {
    let text = match state_name {
        "connected" => "connected",
        "connecting" => "connecting",
        "disconnected" => "disconnected",
        "connectError" => "connect failed",
        "noPermission" => "no permission",
        "disabled" => "not configured",
        "waitingToken" => "not signed in",
        "notificationsDisabled" => "turned off",
        other => other,
    };
    format!("notify: {text}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: ConnectionState,
    pub last_error: String,
    /// `None` until the first transition.
    pub last_event_at: Option<SystemTime>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Init,
            last_error: String::new(),
            last_event_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub at: SystemTime,
    pub message: String,
}

/// How a transition treats `last_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorUpdate {
    Keep,
    Clear,
    Set(String),
}

/// Current status plus a bounded trail of what happened.
///
/// Writers go through `watch::Sender::send_modify`; readers only ever see a
/// snapshot and never contend with the manager's connection lock.
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<StatusSnapshot>,
    activity: Mutex<VecDeque<ActivityEntry>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(StatusSnapshot::default()),
            activity: Mutex::new(VecDeque::with_capacity(ACTIVITY_CAPACITY)),
        }
    }

    pub fn transition(&self, state: ConnectionState, error: ErrorUpdate) {
        let now = SystemTime::now();
        let mut line = format!("state -> {state}");
        self.tx.send_modify(|snap| {
            snap.state = state;
            match &error {
                ErrorUpdate::Keep => {}
                ErrorUpdate::Clear => snap.last_error.clear(),
                ErrorUpdate::Set(msg) => snap.last_error = msg.clone(),
            }
            snap.last_event_at = Some(now);
        });
        if let ErrorUpdate::Set(msg) = &error {
            line.push_str(&format!(" ({msg})"));
        }
        info!("notify {}", line);
        self.push_activity(now, line);
    }

    /// Sets the state without touching the error text or the timestamp.
    pub fn set_state_quietly(&self, state: ConnectionState) {
        self.tx.send_if_modified(|snap| {
            let changed = snap.state != state;
            snap.state = state;
            changed
        });
    }

    /// Records a noteworthy event that is not a state change.
    pub fn note(&self, message: impl Into<String>) {
        self.push_activity(SystemTime::now(), message.into());
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn push_activity(&self, at: SystemTime, message: String) {
        let mut log = self.activity.lock().unwrap_or_else(|e| e.into_inner());
        if log.len() == ACTIVITY_CAPACITY {
            log.pop_front();
        }
        log.push_back(ActivityEntry { at, message });
    }
}
