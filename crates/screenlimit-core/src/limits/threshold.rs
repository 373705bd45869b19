//! Threshold state machine.
//!
//! Evaluated on a fixed cadence by the caller. Each check moves the day's
//! [`ReminderState`] forward at most to the furthest stage the current
//! usage allows, and keeps the actuator's block list in line with it: the
//! monitored set once blocked, empty otherwise.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset};

use super::selection::{load_daily_limit, load_monitored_set, MonitoredSet};
use super::state::{ReminderState, Stage};
use crate::error::CoreError;
use crate::events::Event;
use crate::platform::{AppBlocker, ForegroundProbe, OverlaySurface};
use crate::reminder::{ReminderKind, ReminderSettings};
use crate::storage::KvStore;

/// Minute marks derived from the daily limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub first: u64,
    pub second: u64,
    pub block: u64,
}

impl Thresholds {
    /// Leads larger than the limit clamp to zero.
    pub fn compute(limit_minutes: u64, first_lead: u64, second_lead: u64) -> Self {
        Self {
            first: limit_minutes.saturating_sub(first_lead),
            second: limit_minutes.saturating_sub(second_lead),
            block: limit_minutes,
        }
    }

    pub fn furthest_stage(&self, total_minutes: u64) -> Stage {
        if total_minutes >= self.block {
            Stage::Blocked
        } else if total_minutes >= self.second {
            Stage::SecondWarned
        } else if total_minutes >= self.first {
            Stage::FirstWarned
        } else {
            Stage::Normal
        }
    }

    pub fn remaining(&self, total_minutes: u64) -> u64 {
        self.block.saturating_sub(total_minutes)
    }
}

/// Per-app memory of when the block overlay was last shown.
#[derive(Debug)]
pub struct OverlayThrottle {
    window: Duration,
    last_shown: HashMap<String, DateTime<FixedOffset>>,
}

impl OverlayThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_shown: HashMap::new(),
        }
    }

    /// True when the overlay may be shown for `app` now.
    pub fn allow(&self, app: &str, now: DateTime<FixedOffset>) -> bool {
        match self.last_shown.get(app) {
            Some(last) => now - *last > self.window || now < *last,
            None => true,
        }
    }

    /// Start the window for `app`. Only call once the overlay is up.
    pub fn record(&mut self, app: &str, now: DateTime<FixedOffset>) {
        self.last_shown.insert(app.to_string(), now);
    }

    pub fn clear(&mut self) {
        self.last_shown.clear();
    }
}

/// Collaborators a threshold check reads from and acts on.
pub struct ThresholdContext<'a> {
    pub store: &'a dyn KvStore,
    pub probe: &'a dyn ForegroundProbe,
    pub blocker: &'a dyn AppBlocker,
    pub overlay: Option<&'a dyn OverlaySurface>,
}

pub struct ThresholdMachine {
    throttle: OverlayThrottle,
    /// Last set the actuator accepted in this process.
    synced_block: Option<MonitoredSet>,
}

impl ThresholdMachine {
    pub fn new(overlay_throttle: Duration) -> Self {
        Self {
            throttle: OverlayThrottle::new(overlay_throttle),
            synced_block: None,
        }
    }

    /// Run one check.
    ///
    /// `usage_minutes` is only called when the day isn't blocked yet.
    ///
    /// # Errors
    /// Store failures abort the check before any reminder is emitted; the
    /// next check retries from persisted state.
    pub fn check<F>(
        &mut self,
        ctx: &ThresholdContext<'_>,
        usage_minutes: F,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, CoreError>
    where
        F: FnOnce(&MonitoredSet) -> Result<u64, CoreError>,
    {
        let limit = load_daily_limit(ctx.store)?;
        let monitored = load_monitored_set(ctx.store)?;
        let mut state = ReminderState::load(ctx.store)?;
        let mut events = Vec::new();

        // No limit or nothing monitored: idle, but never leave a block behind.
        if limit == 0 || monitored.is_empty() {
            self.lift(ctx, state.block_applied, now, &mut events);
            return Ok(events);
        }

        if !state.block_applied {
            let settings = ReminderSettings::load(ctx.store)?;
            let thresholds = Thresholds::compute(
                limit,
                settings.first_lead_minutes,
                settings.second_lead_minutes,
            );
            let total = usage_minutes(&monitored)?;
            let remaining = thresholds.remaining(total);

            match thresholds.furthest_stage(total) {
                Stage::Blocked => {
                    state.block_applied = true;
                    state.save(ctx.store)?;
                    tracing::info!(total, limit, "daily limit reached, blocking");
                    events.push(Event::ReminderDue {
                        kind: ReminderKind::LimitReached,
                        remaining_minutes: 0,
                        at: now,
                    });
                    // The sync below pushes the block.
                    self.synced_block = None;
                }
                Stage::SecondWarned if !state.second_reminder_sent => {
                    // The first warning is moot once the final one is out.
                    state.second_reminder_sent = true;
                    state.first_reminder_sent = true;
                    state.save(ctx.store)?;
                    events.push(Event::ReminderDue {
                        kind: ReminderKind::FinalWarning,
                        remaining_minutes: remaining,
                        at: now,
                    });
                }
                Stage::FirstWarned if !state.first_reminder_sent => {
                    state.first_reminder_sent = true;
                    state.save(ctx.store)?;
                    events.push(Event::ReminderDue {
                        kind: ReminderKind::FirstWarning,
                        remaining_minutes: remaining,
                        at: now,
                    });
                }
                _ => {}
            }
        }

        if state.block_applied {
            self.enforce(ctx, &monitored, now, &mut events);
        } else {
            self.lift(ctx, false, now, &mut events);
        }
        Ok(events)
    }

    /// Keep the actuator's block list empty while the day isn't blocked.
    ///
    /// The first check in a process always pushes, so a block left behind
    /// by a failed unblock or a crash is cleared. `was_blocked` marks a
    /// persisted block that is being abandoned.
    fn lift(
        &mut self,
        ctx: &ThresholdContext<'_>,
        was_blocked: bool,
        now: DateTime<FixedOffset>,
        events: &mut Vec<Event>,
    ) {
        let lifting = match &self.synced_block {
            Some(apps) if apps.is_empty() => return,
            Some(_) => true,
            None => was_blocked,
        };
        let empty = MonitoredSet::new();
        match ctx.blocker.set_blocked_apps(&empty) {
            Ok(()) => {
                self.synced_block = Some(empty);
                if lifting {
                    tracing::info!("monitoring idle, block lifted");
                    events.push(Event::BlockLifted { at: now });
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to lift block, will retry"),
        }
    }

    fn enforce(
        &mut self,
        ctx: &ThresholdContext<'_>,
        monitored: &MonitoredSet,
        now: DateTime<FixedOffset>,
        events: &mut Vec<Event>,
    ) {
        if self.synced_block.as_ref() != Some(monitored) {
            match ctx.blocker.set_blocked_apps(monitored) {
                Ok(()) => {
                    self.synced_block = Some(monitored.clone());
                    events.push(Event::BlockApplied {
                        apps: monitored.clone(),
                        at: now,
                    });
                }
                Err(e) => tracing::warn!(error = %e, "failed to apply block, will retry"),
            }
        }

        let Some(app) = ctx.probe.foreground_app() else {
            return;
        };
        if !monitored.contains(&app) {
            return;
        }

        if let Some(overlay) = ctx.overlay {
            if self.throttle.allow(&app, now) {
                match overlay.show_block_overlay(&app) {
                    Ok(()) => {
                        self.throttle.record(&app, now);
                        events.push(Event::BlockOverlayShown { app, at: now });
                        return;
                    }
                    Err(e) => tracing::warn!(error = %e, "block overlay failed"),
                }
            }
        }

        match ctx.blocker.bring_host_to_foreground() {
            Ok(()) => events.push(Event::HostRefocused { app, at: now }),
            Err(e) => tracing::warn!(error = %e, "failed to bring host to foreground"),
        }
    }

    /// Forget in-process enforcement after the day is cleared.
    pub fn reset(&mut self) {
        self.throttle.clear();
        self.synced_block = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn thresholds_for_an_hour() {
        let t = Thresholds::compute(60, 10, 5);
        assert_eq!(t, Thresholds { first: 50, second: 55, block: 60 });
        assert_eq!(t.furthest_stage(49), Stage::Normal);
        assert_eq!(t.furthest_stage(52), Stage::FirstWarned);
        assert_eq!(t.furthest_stage(55), Stage::SecondWarned);
        assert_eq!(t.furthest_stage(61), Stage::Blocked);
        assert_eq!(t.remaining(52), 8);
    }

    #[test]
    fn short_limits_clamp_to_zero() {
        let t = Thresholds::compute(3, 10, 5);
        assert_eq!(t.first, 0);
        assert_eq!(t.second, 0);
        assert_eq!(t.furthest_stage(0), Stage::SecondWarned);
    }

    #[test]
    fn throttle_is_per_app() {
        let mut throttle = OverlayThrottle::new(Duration::seconds(30));
        let start = at("2024-03-10T10:00:00+00:00");
        assert!(throttle.allow("a", start));
        throttle.record("a", start);
        assert!(!throttle.allow("a", start + Duration::seconds(30)));
        assert!(throttle.allow("b", start + Duration::seconds(10)));
        assert!(throttle.allow("a", start + Duration::seconds(31)));
        assert!(throttle.allow("a", start - Duration::seconds(1)));
    }

    #[test]
    fn throttle_window_starts_only_when_recorded() {
        let throttle = OverlayThrottle::new(Duration::seconds(30));
        let start = at("2024-03-10T10:00:00+00:00");
        assert!(throttle.allow("a", start));
        assert!(throttle.allow("a", start + Duration::seconds(1)));
    }
}
