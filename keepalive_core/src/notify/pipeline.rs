use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::payload::{render, RenderedMessage};
use crate::platform::{
    ChannelSpec, LaunchResolver, Notification, NotifyError, Notifier, Permission,
    PermissionChecker, NOTIFICATION_ID_BASE,
};

/// What happened to one inbound message.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Posted { id: i32, message: RenderedMessage },
    /// Runtime permission missing; the event was dropped.
    NoPermission,
    /// Notifications are switched off for the app; the event was dropped.
    NotificationsDisabled,
    Failed(NotifyError),
}

/// Strictly increasing notification ids, starting at [`NOTIFICATION_ID_BASE`].
///
/// Two messages never share an id, so a burst shows every message instead of
/// the last one replacing the others.
#[derive(Debug, Default)]
pub struct NotificationIds {
    issued: AtomicU32,
}

impl NotificationIds {
    pub fn next(&self) -> i32 {
        let span = (i32::MAX - NOTIFICATION_ID_BASE) as u32;
        let n = self.issued.fetch_add(1, Ordering::Relaxed) % span;
        NOTIFICATION_ID_BASE + n as i32
    }
}

/// Turns `notify.message` payloads into posted notifications.
pub struct NotificationPipeline {
    notifier: Arc<dyn Notifier>,
    permissions: Arc<dyn PermissionChecker>,
    launcher: Arc<dyn LaunchResolver>,
    app_name: String,
    package: String,
    channel: ChannelSpec,
    ids: NotificationIds,
}

impl NotificationPipeline {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        permissions: Arc<dyn PermissionChecker>,
        launcher: Arc<dyn LaunchResolver>,
        app_name: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        let app_name = app_name.into();
        Self {
            notifier,
            permissions,
            launcher,
            channel: ChannelSpec::messages(&app_name),
            app_name,
            package: package.into(),
            ids: NotificationIds::default(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn ensure_channel(&self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.notifier.ensure_channel(&self.channel)
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Could not create notification channel {}: {}", self.channel.id, e)
            }
            Err(panic) => error!(
                "Notifier panicked creating channel {}: {}",
                self.channel.id,
                panic_detail(panic.as_ref())
            ),
        }
    }

    /// Never panics: a panic in host code becomes [`DeliveryOutcome::Failed`]
    /// so it cannot take the connection task down with it.
    pub fn deliver(&self, payload: &Value) -> DeliveryOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_deliver(payload))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                error!("Notification host code panicked: {}", detail);
                DeliveryOutcome::Failed(NotifyError::Other(format!("host panicked: {detail}")))
            }
        }
    }

    fn try_deliver(&self, payload: &Value) -> DeliveryOutcome {
        // A failed platform query is not a denial; carry on and let `post`
        // report whatever actually goes wrong.
        match self.permissions.notification_permission() {
            Ok(Permission::Denied) => {
                info!("Dropping notification: permission not granted");
                return DeliveryOutcome::NoPermission;
            }
            Ok(_) => {}
            Err(e) => warn!("Permission check failed: {}", e),
        }

        match self.notifier.notifications_enabled() {
            Ok(false) => {
                info!("Dropping notification: notifications disabled for app");
                return DeliveryOutcome::NotificationsDisabled;
            }
            Ok(true) => {}
            Err(e) => warn!("Could not query notification settings: {}", e),
        }

        self.ensure_channel();

        let message = render(payload, &self.app_name);
        let notification = Notification {
            channel_id: self.channel.id.clone(),
            title: message.title.clone(),
            body: message.body.clone(),
            launch: self.launcher.launch_target(&self.package),
            auto_cancel: true,
        };
        if notification.launch.is_none() {
            debug!("No launch target for {}; posting without tap action", self.package);
        }

        let id = self.ids.next();
        match self.notifier.post(id, &notification) {
            Ok(()) => {
                debug!("Posted notification {}: {:?}", id, message);
                DeliveryOutcome::Posted { id, message }
            }
            Err(e) => DeliveryOutcome::Failed(e),
        }
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
