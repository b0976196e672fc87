use std::io::{stdout, Write};

use keepalive_core::platform::{ChannelSpec, Notification, NotifyError, Notifier};
use log::debug;

/// Prints notifications to stdout instead of a system tray.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), NotifyError> {
        debug!("Channel '{}' ({}) ready", channel.id, channel.name);
        Ok(())
    }

    fn notifications_enabled(&self) -> Result<bool, NotifyError> {
        Ok(true)
    }

    fn post(&self, id: i32, notification: &Notification) -> Result<(), NotifyError> {
        let mut out = stdout().lock();
        writeln!(out, "[{id}] {}: {}", notification.title, notification.body)
            .and_then(|_| out.flush())
            .map_err(|e| NotifyError::Platform(format!("stdout: {e}")))
    }
}
