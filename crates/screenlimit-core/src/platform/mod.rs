//! Host platform capabilities consumed by the enforcement engine.
//!
//! Each capability is one typed trait the host implements once. The engine
//! never probes for optional methods at runtime: a capability the host lacks
//! is either an `Option` in [`Host`] or a method returning
//! [`PlatformError::Unavailable`].

pub mod fake;

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::storage::KvStore;

/// Reports the application currently in the foreground.
pub trait ForegroundProbe: Send {
    /// Must not block indefinitely. Any failure is reported as `None`.
    fn foreground_app(&self) -> Option<String>;
}

/// Blocks applications and raises the host app.
pub trait AppBlocker: Send {
    /// Idempotent. An empty set unblocks everything.
    fn set_blocked_apps(&self, apps: &BTreeSet<String>) -> Result<(), PlatformError>;

    /// Best-effort; callers treat failure as non-fatal.
    fn bring_host_to_foreground(&self) -> Result<(), PlatformError>;
}

/// Platform-reported usage statistics for today.
pub trait UsageStats: Send {
    fn usage_minutes(&self, app: &str) -> Result<u64, PlatformError>;

    /// Batched form, preferred over per-app queries.
    fn all_usage_minutes(&self) -> Result<HashMap<String, u64>, PlatformError>;
}

/// Notification permission tri-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Authorized,
    Denied,
    Undetermined,
}

/// User-visible reminder channels. Each call fails independently.
pub trait Notifier: Send {
    fn permission_status(&self) -> Permission;

    /// Prompt the user. Returns the permission after the prompt.
    fn request_permission(&self) -> Permission;

    fn notify(&self, title: &str, body: &str) -> Result<(), PlatformError>;

    /// Pattern of alternating wait/vibrate durations in milliseconds.
    fn vibrate(&self, pattern: &[u64]) -> Result<(), PlatformError>;

    fn play_sound(&self) -> Result<(), PlatformError>;
}

/// In-app navigation surface for full-screen overlays.
pub trait OverlaySurface: Send {
    fn show_reminder_overlay(&self, remaining_minutes: u64) -> Result<(), PlatformError>;

    fn show_block_overlay(&self, app: &str) -> Result<(), PlatformError>;
}

/// Wake-up alarm that survives process death.
///
/// Re-arming after the alarm fires is the caller's job.
pub trait AlarmScheduler: Send {
    fn schedule_at(&self, at: DateTime<FixedOffset>) -> Result<(), PlatformError>;
}

/// Every collaborator the engine talks to, handed over once at startup.
pub struct Host {
    pub store: Box<dyn KvStore>,
    pub probe: Box<dyn ForegroundProbe>,
    pub blocker: Box<dyn AppBlocker>,
    pub notifier: Box<dyn Notifier>,
    pub usage: Option<Box<dyn UsageStats>>,
    pub overlay: Option<Box<dyn OverlaySurface>>,
    pub alarms: Option<Box<dyn AlarmScheduler>>,
}

impl Host {
    pub fn new(
        store: Box<dyn KvStore>,
        probe: Box<dyn ForegroundProbe>,
        blocker: Box<dyn AppBlocker>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            probe,
            blocker,
            notifier,
            usage: None,
            overlay: None,
            alarms: None,
        }
    }

    pub fn with_usage_stats(mut self, usage: Box<dyn UsageStats>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_overlay(mut self, overlay: Box<dyn OverlaySurface>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_alarm_scheduler(mut self, alarms: Box<dyn AlarmScheduler>) -> Self {
        self.alarms = Some(alarms);
        self
    }
}
