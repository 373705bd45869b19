//! Enforcement engine.
//!
//! Owns the poller, the threshold machine, the reset scheduler and the
//! reminder dispatcher, and routes the events one component produces to
//! the ones that react to it. Like the other state machines in this crate
//! it has no thread of its own: [`MonitorRuntime`](super::MonitorRuntime)
//! or a test calls each cadence method.
//!
//! Every entry point absorbs component errors: they are logged and the
//! next cadence retries from persisted state.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::events::Event;
use crate::limits::{
    MonitoredSet, ThresholdContext, ThresholdMachine, UsageSnapshot,
};
use crate::platform::Host;
use crate::reminder::{Reminder, ReminderDispatcher, ReminderKind, ReminderSettings};
use crate::reset::{DailyResetScheduler, ResetContext, ResetReport};
use crate::storage::{Config, UsageSource};
use crate::usage::{aggregate_minutes, counter_minutes, PollerContext, UsagePoller};

pub struct EnforcementEngine {
    host: Host,
    clock: Arc<dyn Clock>,
    config: Config,
    poller: UsagePoller,
    thresholds: ThresholdMachine,
    resets: DailyResetScheduler,
    dispatcher: ReminderDispatcher,
}

impl EnforcementEngine {
    pub fn new(host: Host, clock: Arc<dyn Clock>, config: Config) -> Self {
        if config.limits.usage_source == UsageSource::Platform && host.usage.is_none() {
            tracing::warn!("platform usage source configured but host has no usage stats, using counter");
        }
        let dispatcher = ReminderDispatcher::new(host.notifier.as_ref());
        Self {
            poller: UsagePoller::new(config.stale_session()),
            thresholds: ThresholdMachine::new(config.overlay_throttle()),
            resets: DailyResetScheduler::new(config.missed_reset_window()),
            dispatcher,
            host,
            clock,
            config,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn is_accumulating(&self) -> bool {
        self.poller.is_accumulating()
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    pub fn snapshot(&self) -> Result<UsageSnapshot, CoreError> {
        Ok(UsageSnapshot::load(self.host.store.as_ref())?)
    }

    /// Time until the persisted reset alarm, if one is armed.
    pub fn until_next_alarm(&self) -> Option<std::time::Duration> {
        let at = DailyResetScheduler::scheduled_for(self.host.store.as_ref()).ok()??;
        (at - self.clock.now())
            .to_std()
            .ok()
            .or(Some(std::time::Duration::ZERO))
    }

    // ── Cadences ─────────────────────────────────────────────────────

    /// Bring persisted state up to date before the first cadence runs.
    ///
    /// A reset alarm that should have fired while nothing was running is
    /// treated as firing now.
    pub fn start(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        tracing::info!(generation = %self.poller.generation(), "enforcement engine starting");

        let overdue = matches!(
            DailyResetScheduler::scheduled_for(self.host.store.as_ref()),
            Ok(Some(at)) if at <= now
        );
        let mut events = if overdue { self.on_alarm() } else { self.check_reset() };

        // Platform alarms may not survive a restart.
        let ctx = ResetContext {
            store: self.host.store.as_ref(),
            blocker: self.host.blocker.as_ref(),
            alarms: self.host.alarms.as_deref(),
        };
        self.resets.arm(&ctx, now);

        events.extend(self.check_thresholds());
        events
    }

    pub fn poll_foreground(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let ctx = PollerContext {
            store: self.host.store.as_ref(),
            probe: self.host.probe.as_ref(),
            blocker: self.host.blocker.as_ref(),
        };
        let result = self.poller.poll(&ctx, now);
        self.absorb("poll", result)
    }

    pub fn accumulate(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let ctx = PollerContext {
            store: self.host.store.as_ref(),
            probe: self.host.probe.as_ref(),
            blocker: self.host.blocker.as_ref(),
        };
        let result = self.poller.tick(&ctx, now);
        self.absorb("accumulate", result)
    }

    pub fn check_thresholds(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let ctx = ThresholdContext {
            store: self.host.store.as_ref(),
            probe: self.host.probe.as_ref(),
            blocker: self.host.blocker.as_ref(),
            overlay: self.host.overlay.as_deref(),
        };
        let source = self.config.limits.usage_source;
        let stats = self.host.usage.as_deref();
        let store = self.host.store.as_ref();
        let usage = |monitored: &MonitoredSet| -> Result<u64, CoreError> {
            match (source, stats) {
                (UsageSource::Platform, Some(stats)) => Ok(aggregate_minutes(stats, monitored)),
                _ => Ok(counter_minutes(store)?),
            }
        };
        let result = self.thresholds.check(&ctx, usage, now);
        self.absorb("thresholds", result)
    }

    pub fn check_reset(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let ctx = ResetContext {
            store: self.host.store.as_ref(),
            blocker: self.host.blocker.as_ref(),
            alarms: self.host.alarms.as_deref(),
        };
        let result = self.resets.check(&ctx, now);
        self.absorb("reset", result)
    }

    pub fn on_alarm(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let ctx = ResetContext {
            store: self.host.store.as_ref(),
            blocker: self.host.blocker.as_ref(),
            alarms: self.host.alarms.as_deref(),
        };
        let result = self.resets.on_alarm(&ctx, now);
        self.absorb("alarm", result)
    }

    /// Reset now, whatever the date bookkeeping says.
    pub fn force_reset(&mut self) -> (ResetReport, Vec<Event>) {
        let now = self.clock.now();
        let ctx = ResetContext {
            store: self.host.store.as_ref(),
            blocker: self.host.blocker.as_ref(),
            alarms: self.host.alarms.as_deref(),
        };
        let (report, events) = self.resets.force(&ctx, now);
        (report, self.route(events))
    }

    /// Stop accumulating, release the running token and lift the block.
    pub fn stop(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let mut events = self.poller.stop(self.host.store.as_ref(), now);
        if let Err(e) = self.host.blocker.set_blocked_apps(&MonitoredSet::new()) {
            tracing::warn!(error = %e, "failed to lift block on stop");
        }
        self.thresholds.reset();
        tracing::info!("enforcement engine stopped");
        events.push(Event::MonitoringStopped { at: now });
        events
    }

    // ── Routing ──────────────────────────────────────────────────────

    fn absorb(&mut self, cadence: &str, result: Result<Vec<Event>, CoreError>) -> Vec<Event> {
        match result {
            Ok(events) => self.route(events),
            Err(e) => {
                tracing::warn!(cadence, error = %e, "check failed, will retry");
                Vec::new()
            }
        }
    }

    /// Pass events on to the components that react to them. Returns the
    /// input events followed by whatever they caused.
    fn route(&mut self, events: Vec<Event>) -> Vec<Event> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            let follow_up = match &event {
                Event::ReminderDue {
                    kind,
                    remaining_minutes,
                    ..
                } => self.deliver(Reminder::new(*kind, *remaining_minutes)),
                Event::LimitApproaching { remaining_secs, .. } => {
                    let minutes = remaining_secs.div_ceil(60);
                    let mut due = vec![Event::ReminderDue {
                        kind: ReminderKind::Approaching,
                        remaining_minutes: minutes,
                        at: self.clock.now(),
                    }];
                    due.extend(self.deliver(Reminder::new(ReminderKind::Approaching, minutes)));
                    due
                }
                // Apply the block and announce it without waiting for the
                // next threshold cadence.
                Event::LimitReached { .. } => self.check_thresholds(),
                Event::ResetPerformed { .. } => {
                    self.thresholds.reset();
                    self.deliver(Reminder::new(ReminderKind::ResetDone, 0))
                }
                _ => Vec::new(),
            };
            out.push(event);
            out.extend(follow_up);
        }
        out
    }

    fn deliver(&mut self, reminder: Reminder) -> Vec<Event> {
        let settings = match ReminderSettings::load(self.host.store.as_ref()) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "could not read reminder settings, using defaults");
                ReminderSettings::default()
            }
        };
        let report = self.dispatcher.dispatch(
            &reminder,
            &settings,
            self.host.notifier.as_ref(),
            self.host.overlay.as_deref(),
        );
        match report {
            Some(report) => vec![Event::ReminderDelivered {
                kind: reminder.kind,
                via_notification: report.via_notification,
                fallback_used: report.fallback_used,
                overlay_shown: report.overlay_shown,
                at: self.clock.now(),
            }],
            None => Vec::new(),
        }
    }
}
