//! Seams to the host platform.
//!
//! The core never talks to an OS notification service directly. A host
//! (mobile shell, desktop daemon, test) implements these traits and hands
//! them to [`ConnectionManager::builder`](crate::ConnectionManager::builder).

use thiserror::Error;

/// Channel every message notification is posted to.
pub const CHANNEL_ID: &str = "keepalive_notify";

/// Id of the persistent keep-alive notification owned by the host service.
/// Message notifications are numbered from [`NOTIFICATION_ID_BASE`] upwards
/// and never reach it.
pub const KEEPALIVE_NOTIFICATION_ID: i32 = 10301;
pub const NOTIFICATION_ID_BASE: i32 = 20300;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Platform error: {0}")]
    Platform(String),
    #[error("Other error: {0}")]
    Other(String),
}

/// Runtime notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The platform version has no runtime permission for notifications.
    NotRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl ChannelSpec {
    pub fn messages(app_name: &str) -> Self {
        Self {
            id: CHANNEL_ID.to_string(),
            name: format!("{app_name} messages"),
            description: format!("{app_name} message alerts"),
        }
    }
}

/// Something a notification tap can bring to the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    pub package: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel_id: String,
    pub title: String,
    pub body: String,
    /// `None` posts without a tap action.
    pub launch: Option<LaunchTarget>,
    pub auto_cancel: bool,
}

pub trait Notifier: Send + Sync {
    /// Creates the channel if needed. Must be idempotent.
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), NotifyError>;
    /// Whether the user left notifications switched on for the app.
    fn notifications_enabled(&self) -> Result<bool, NotifyError>;
    fn post(&self, id: i32, notification: &Notification) -> Result<(), NotifyError>;
}

pub trait PermissionChecker: Send + Sync {
    fn notification_permission(&self) -> Result<Permission, NotifyError>;
}

pub trait LaunchResolver: Send + Sync {
    fn launch_target(&self, package: &str) -> Option<LaunchTarget>;
}

/// For platforms without a runtime notification permission.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPermissionRequired;

impl PermissionChecker for NoPermissionRequired {
    fn notification_permission(&self) -> Result<Permission, NotifyError> {
        Ok(Permission::NotRequired)
    }
}

/// Resolves every package to itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct SamePackageLauncher;

impl LaunchResolver for SamePackageLauncher {
    fn launch_target(&self, package: &str) -> Option<LaunchTarget> {
        Some(LaunchTarget {
            package: package.to_string(),
        })
    }
}
