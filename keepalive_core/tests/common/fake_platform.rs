//! Recording stand-ins for the platform notification seams.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use keepalive_core::platform::{
    ChannelSpec, Notification, NotifyError, Notifier, Permission, PermissionChecker,
};

#[derive(Default)]
pub struct RecordingNotifier {
    posted: Mutex<Vec<(i32, Notification)>>,
    channels: AtomicUsize,
    disabled: AtomicBool,
    failing: AtomicBool,
    panic_next: AtomicBool,
}

impl RecordingNotifier {
    pub fn posted(&self) -> Vec<(i32, Notification)> {
        self.posted.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posted.lock().unwrap().len()
    }

    pub fn channel_requests(&self) -> usize {
        self.channels.load(Ordering::SeqCst)
    }

    /// Simulates the user switching notifications off for the app.
    pub fn set_enabled(&self, enabled: bool) {
        self.disabled.store(!enabled, Ordering::SeqCst);
    }

    /// Makes the next `post` panic, as buggy host code would.
    pub fn panic_on_next_post(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    /// Makes every following `post` fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    fn ensure_channel(&self, _channel: &ChannelSpec) -> Result<(), NotifyError> {
        self.channels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn notifications_enabled(&self) -> Result<bool, NotifyError> {
        Ok(!self.disabled.load(Ordering::SeqCst))
    }

    fn post(&self, id: i32, notification: &Notification) -> Result<(), NotifyError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("notification host crashed");
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Platform("notification service unavailable".into()));
        }
        self.posted.lock().unwrap().push((id, notification.clone()));
        Ok(())
    }
}

pub struct SwitchablePermission {
    granted: AtomicBool,
}

impl SwitchablePermission {
    pub fn granted() -> Self {
        Self {
            granted: AtomicBool::new(true),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl PermissionChecker for SwitchablePermission {
    fn notification_permission(&self) -> Result<Permission, NotifyError> {
        if self.granted.load(Ordering::SeqCst) {
            Ok(Permission::Granted)
        } else {
            Ok(Permission::Denied)
        }
    }
}
