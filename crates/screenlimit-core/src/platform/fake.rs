//! In-memory fakes for every platform capability.
//!
//! Clones share state, so a test can keep a handle while the engine owns
//! the boxed copy. The CLI also uses them for dry runs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset};

use super::{AlarmScheduler, AppBlocker, ForegroundProbe, Notifier, OverlaySurface, Permission, UsageStats};
use crate::error::PlatformError;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    current: Arc<Mutex<Option<String>>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_foreground(&self, app: Option<&str>) {
        *lock(&self.current) = app.map(str::to_string);
    }
}

impl ForegroundProbe for FakeProbe {
    fn foreground_app(&self) -> Option<String> {
        lock(&self.current).clone()
    }
}

#[derive(Debug, Default)]
struct BlockerLog {
    pushes: Vec<BTreeSet<String>>,
    host_foregrounds: usize,
    failing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBlocker {
    inner: Arc<Mutex<BlockerLog>>,
}

impl FakeBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `set_blocked_apps` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.inner).failing = failing;
    }

    /// Every set pushed to the actuator, oldest first.
    pub fn pushes(&self) -> Vec<BTreeSet<String>> {
        lock(&self.inner).pushes.clone()
    }

    /// The set currently blocked (empty when nothing was ever pushed).
    pub fn blocked(&self) -> BTreeSet<String> {
        lock(&self.inner).pushes.last().cloned().unwrap_or_default()
    }

    pub fn host_foregrounds(&self) -> usize {
        lock(&self.inner).host_foregrounds
    }
}

impl AppBlocker for FakeBlocker {
    fn set_blocked_apps(&self, apps: &BTreeSet<String>) -> Result<(), PlatformError> {
        let mut log = lock(&self.inner);
        if log.failing {
            return Err(PlatformError::failed("set_blocked_apps", "actuator offline"));
        }
        log.pushes.push(apps.clone());
        Ok(())
    }

    fn bring_host_to_foreground(&self) -> Result<(), PlatformError> {
        lock(&self.inner).host_foregrounds += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct UsageTable {
    minutes: HashMap<String, u64>,
    batch_fails: bool,
    failing_apps: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeUsage {
    inner: Arc<Mutex<UsageTable>>,
}

impl FakeUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_minutes(&self, app: &str, minutes: u64) {
        lock(&self.inner).minutes.insert(app.to_string(), minutes);
    }

    pub fn fail_batch(&self, fails: bool) {
        lock(&self.inner).batch_fails = fails;
    }

    pub fn fail_app(&self, app: &str) {
        lock(&self.inner).failing_apps.insert(app.to_string());
    }
}

impl UsageStats for FakeUsage {
    fn usage_minutes(&self, app: &str) -> Result<u64, PlatformError> {
        let table = lock(&self.inner);
        if table.failing_apps.contains(app) {
            return Err(PlatformError::failed("usage_minutes", format!("no stats for {app}")));
        }
        Ok(table.minutes.get(app).copied().unwrap_or(0))
    }

    fn all_usage_minutes(&self) -> Result<HashMap<String, u64>, PlatformError> {
        let table = lock(&self.inner);
        if table.batch_fails {
            return Err(PlatformError::failed("all_usage_minutes", "batched query rejected"));
        }
        Ok(table.minutes.clone())
    }
}

/// One thing the user saw or heard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Notification { title: String, body: String },
    Sound,
    Vibration,
}

#[derive(Debug)]
struct NotifierState {
    permission: Permission,
    after_prompt: Permission,
    prompts: usize,
    notify_fails: bool,
    sound_fails: bool,
    delivered: Vec<Delivery>,
}

#[derive(Debug, Clone)]
pub struct FakeNotifier {
    inner: Arc<Mutex<NotifierState>>,
}

impl FakeNotifier {
    /// `permission` is the starting state; a prompt leaves it unchanged.
    pub fn new(permission: Permission) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NotifierState {
                permission,
                after_prompt: permission,
                prompts: 0,
                notify_fails: false,
                sound_fails: false,
                delivered: Vec::new(),
            })),
        }
    }

    pub fn authorized() -> Self {
        Self::new(Permission::Authorized)
    }

    /// What a prompt resolves to.
    pub fn grant_on_prompt(&self, outcome: Permission) {
        lock(&self.inner).after_prompt = outcome;
    }

    pub fn fail_notifications(&self, fails: bool) {
        lock(&self.inner).notify_fails = fails;
    }

    pub fn fail_sound(&self, fails: bool) {
        lock(&self.inner).sound_fails = fails;
    }

    pub fn prompts(&self) -> usize {
        lock(&self.inner).prompts
    }

    pub fn delivered(&self) -> Vec<Delivery> {
        lock(&self.inner).delivered.clone()
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        lock(&self.inner)
            .delivered
            .iter()
            .filter_map(|d| match d {
                Delivery::Notification { title, body } => Some((title.clone(), body.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Default for FakeNotifier {
    fn default() -> Self {
        Self::authorized()
    }
}

impl Notifier for FakeNotifier {
    fn permission_status(&self) -> Permission {
        lock(&self.inner).permission
    }

    fn request_permission(&self) -> Permission {
        let mut state = lock(&self.inner);
        state.prompts += 1;
        state.permission = state.after_prompt;
        state.permission
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), PlatformError> {
        let mut state = lock(&self.inner);
        if state.notify_fails {
            return Err(PlatformError::failed("notify", "delivery rejected"));
        }
        state.delivered.push(Delivery::Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    fn vibrate(&self, _pattern: &[u64]) -> Result<(), PlatformError> {
        lock(&self.inner).delivered.push(Delivery::Vibration);
        Ok(())
    }

    fn play_sound(&self) -> Result<(), PlatformError> {
        let mut state = lock(&self.inner);
        if state.sound_fails {
            return Err(PlatformError::failed("play_sound", "audio device busy"));
        }
        state.delivered.push(Delivery::Sound);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayShown {
    Reminder { remaining_minutes: u64 },
    Block { app: String },
}

#[derive(Debug, Clone, Default)]
pub struct FakeOverlay {
    shown: Arc<Mutex<Vec<OverlayShown>>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn shown(&self) -> Vec<OverlayShown> {
        lock(&self.shown).clone()
    }

    pub fn block_overlays(&self) -> usize {
        lock(&self.shown)
            .iter()
            .filter(|s| matches!(s, OverlayShown::Block { .. }))
            .count()
    }
}

impl OverlaySurface for FakeOverlay {
    fn show_reminder_overlay(&self, remaining_minutes: u64) -> Result<(), PlatformError> {
        if *lock(&self.failing) {
            return Err(PlatformError::failed("show_reminder_overlay", "surface unavailable"));
        }
        lock(&self.shown).push(OverlayShown::Reminder { remaining_minutes });
        Ok(())
    }

    fn show_block_overlay(&self, app: &str) -> Result<(), PlatformError> {
        if *lock(&self.failing) {
            return Err(PlatformError::failed("show_block_overlay", "surface unavailable"));
        }
        lock(&self.shown).push(OverlayShown::Block {
            app: app.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeAlarms {
    scheduled: Arc<Mutex<Vec<DateTime<FixedOffset>>>>,
}

impl FakeAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<DateTime<FixedOffset>> {
        lock(&self.scheduled).clone()
    }
}

impl AlarmScheduler for FakeAlarms {
    fn schedule_at(&self, at: DateTime<FixedOffset>) -> Result<(), PlatformError> {
        lock(&self.scheduled).push(at);
        Ok(())
    }
}
