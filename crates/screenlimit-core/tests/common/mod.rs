//! Shared rig for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use screenlimit_core::platform::fake::{
    FakeAlarms, FakeBlocker, FakeNotifier, FakeOverlay, FakeProbe, FakeUsage,
};
use screenlimit_core::storage::kv::{self, keys};
use screenlimit_core::{
    Config, EnforcementEngine, Event, Host, KvStore, ManualClock, MemoryStore, UsageSource,
};

pub struct Rig {
    pub store: MemoryStore,
    pub probe: FakeProbe,
    pub blocker: FakeBlocker,
    pub notifier: FakeNotifier,
    pub usage: FakeUsage,
    pub overlay: FakeOverlay,
    pub alarms: FakeAlarms,
    pub clock: ManualClock,
    pub config: Config,
}

impl Rig {
    pub fn at(rfc3339: &str) -> Self {
        Self {
            store: MemoryStore::new(),
            probe: FakeProbe::new(),
            blocker: FakeBlocker::new(),
            notifier: FakeNotifier::authorized(),
            usage: FakeUsage::new(),
            overlay: FakeOverlay::new(),
            alarms: FakeAlarms::new(),
            clock: ManualClock::at(rfc3339),
            config: Config::default(),
        }
    }

    pub fn platform_usage(mut self) -> Self {
        self.config.limits.usage_source = UsageSource::Platform;
        self
    }

    pub fn monitor(self, apps: &[&str], limit_minutes: u64) -> Self {
        let list: Vec<&str> = apps.to_vec();
        kv::write_json(&self.store, keys::SELECTED_APPS, &list).unwrap();
        kv::write_u64(&self.store, keys::TOTAL_MINUTES, limit_minutes).unwrap();
        self
    }

    /// Pretend a reset already ran today so start-up doesn't record one.
    pub fn reset_today(self) -> Self {
        let now = self.now();
        kv::write_date(&self.store, keys::LAST_RESET_DATE, now.date_naive()).unwrap();
        kv::write_timestamp(&self.store, keys::LAST_RESET_TIMESTAMP, now).unwrap();
        self
    }

    pub fn engine(&self) -> EnforcementEngine {
        let host = Host::new(
            Box::new(self.store.clone()),
            Box::new(self.probe.clone()),
            Box::new(self.blocker.clone()),
            Box::new(self.notifier.clone()),
        )
        .with_usage_stats(Box::new(self.usage.clone()))
        .with_overlay(Box::new(self.overlay.clone()))
        .with_alarm_scheduler(Box::new(self.alarms.clone()));
        EnforcementEngine::new(host, Arc::new(self.clock.clone()), self.config.clone())
    }

    pub fn now(&self) -> chrono::DateTime<chrono::FixedOffset> {
        use screenlimit_core::Clock;
        self.clock.now()
    }

    pub fn counter(&self) -> u64 {
        kv::read_u64(&self.store, keys::COUNTER).unwrap()
    }

    pub fn set_counter(&self, secs: u64) {
        kv::write_u64(&self.store, keys::COUNTER, secs).unwrap();
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap()
    }
}

pub fn count<F: Fn(&Event) -> bool>(events: &[Event], pred: F) -> usize {
    events.iter().filter(|e| pred(e)).count()
}
