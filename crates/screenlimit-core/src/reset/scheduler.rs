//! Daily reset scheduler.
//!
//! Clears the counter, the reminder flags and the block once per calendar
//! day. Driven by a periodic [`DailyResetScheduler::check`] and by the
//! midnight alarm; both apply the same eligibility rule, so whichever runs
//! first wins and the other finds nothing to do.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

use super::calendar::{is_midnight_minute, next_midnight};
use crate::error::{CoreError, StoreError};
use crate::events::{Event, ResetTrigger};
use crate::limits::ReminderState;
use crate::platform::{AlarmScheduler, AppBlocker};
use crate::storage::kv::{self, keys, KvStore};

/// Outcome of the eligibility rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDecision {
    NotDue,
    /// The last reset is dated after today.
    ClockBehind,
    /// No reset was ever recorded.
    FirstRun,
    Due(ResetTrigger),
}

/// Decide whether a reset should run at `now`.
pub fn evaluate(
    now: DateTime<FixedOffset>,
    last_date: Option<NaiveDate>,
    last_at: Option<DateTime<FixedOffset>>,
    window: Duration,
) -> ResetDecision {
    let today = now.date_naive();
    let Some(last_day) = last_date.or_else(|| last_at.map(|t| t.date_naive())) else {
        return ResetDecision::FirstRun;
    };

    if last_day == today {
        return ResetDecision::NotDue;
    }
    if last_day > today {
        return ResetDecision::ClockBehind;
    }
    if is_midnight_minute(now) {
        return ResetDecision::Due(ResetTrigger::Midnight);
    }
    match last_at {
        None => ResetDecision::Due(ResetTrigger::CatchUp),
        Some(at) if now - at > window => ResetDecision::Due(ResetTrigger::CatchUp),
        Some(_) => ResetDecision::NotDue,
    }
}

pub struct ResetContext<'a> {
    pub store: &'a dyn KvStore,
    pub blocker: &'a dyn AppBlocker,
    pub alarms: Option<&'a dyn AlarmScheduler>,
}

/// Which reset steps succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub date: NaiveDate,
    pub trigger: ResetTrigger,
    pub counter_cleared: bool,
    pub state_cleared: bool,
    pub unblocked: bool,
    /// `lastResetDate` and `lastResetTimestamp` were written. Only attempted
    /// once the counter and reminder state are cleared.
    pub recorded: bool,
    pub alarm_armed: bool,
}

impl ResetReport {
    pub fn is_complete(&self) -> bool {
        self.counter_cleared && self.state_cleared && self.unblocked && self.recorded
    }
}

pub struct DailyResetScheduler {
    window: Duration,
}

impl DailyResetScheduler {
    pub fn new(missed_window: Duration) -> Self {
        Self {
            window: missed_window,
        }
    }

    pub fn decide(
        &self,
        store: &dyn KvStore,
        now: DateTime<FixedOffset>,
    ) -> Result<ResetDecision, StoreError> {
        let last_date = kv::read_date(store, keys::LAST_RESET_DATE)?;
        let last_at = kv::read_timestamp(store, keys::LAST_RESET_TIMESTAMP)?;
        Ok(evaluate(now, last_date, last_at, self.window))
    }

    /// Periodic check.
    pub fn check(
        &self,
        ctx: &ResetContext<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, CoreError> {
        let events = match self.decide(ctx.store, now)? {
            ResetDecision::NotDue => Vec::new(),
            ResetDecision::ClockBehind => {
                tracing::warn!(now = %now, "last reset is dated in the future, skipping");
                Vec::new()
            }
            ResetDecision::FirstRun => self.record_baseline(ctx, now)?,
            ResetDecision::Due(trigger) => {
                let report = self.execute(ctx, trigger, now);
                return Ok(report_events(&report, now));
            }
        };
        self.ensure_armed(ctx, now);
        Ok(events)
    }

    /// The midnight alarm fired.
    pub fn on_alarm(
        &self,
        ctx: &ResetContext<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, CoreError> {
        tracing::debug!(now = %now, "reset alarm fired");
        self.check(ctx, now)
    }

    /// Reset now regardless of eligibility.
    pub fn force(&self, ctx: &ResetContext<'_>, now: DateTime<FixedOffset>) -> (ResetReport, Vec<Event>) {
        let report = self.execute(ctx, ResetTrigger::Forced, now);
        let events = report_events(&report, now);
        (report, events)
    }

    /// Run every reset step. A failing step is logged and the rest still run.
    pub fn execute(
        &self,
        ctx: &ResetContext<'_>,
        trigger: ResetTrigger,
        now: DateTime<FixedOffset>,
    ) -> ResetReport {
        let date = now.date_naive();
        tracing::info!(?trigger, %date, "performing daily reset");

        let counter_cleared = step("clear counter", kv::write_u64(ctx.store, keys::COUNTER, 0));
        let state_cleared = step("clear reminder state", ReminderState::default().save(ctx.store));
        let unblocked = step("unblock", ctx.blocker.set_blocked_apps(&BTreeSet::new()));

        // The day counts as reset once usage and flags are cleared. A failed
        // unblock is retried by the next threshold check, not by clearing
        // usage again.
        let recorded = counter_cleared
            && state_cleared
            && step("record reset", self.record(ctx.store, now));

        let alarm_armed = self.arm(ctx, now);

        ResetReport {
            date,
            trigger,
            counter_cleared,
            state_cleared,
            unblocked,
            recorded,
            alarm_armed,
        }
    }

    fn record_baseline(
        &self,
        ctx: &ResetContext<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, CoreError> {
        self.record(ctx.store, now)?;
        self.arm(ctx, now);
        tracing::info!(date = %now.date_naive(), "recorded reset baseline");
        Ok(vec![Event::BaselineRecorded {
            date: now.date_naive(),
            at: now,
        }])
    }

    fn record(&self, store: &dyn KvStore, now: DateTime<FixedOffset>) -> Result<(), StoreError> {
        kv::write_date(store, keys::LAST_RESET_DATE, now.date_naive())?;
        kv::write_timestamp(store, keys::LAST_RESET_TIMESTAMP, now)
    }

    /// Persist and register the next midnight alarm.
    pub fn arm(&self, ctx: &ResetContext<'_>, now: DateTime<FixedOffset>) -> bool {
        let at = next_midnight(now);
        let mut armed = step(
            "persist reset alarm",
            kv::write_timestamp(ctx.store, keys::RESET_SCHEDULED_FOR, at),
        );
        if let Some(alarms) = ctx.alarms {
            armed &= step("schedule reset alarm", alarms.schedule_at(at));
        }
        if armed {
            tracing::debug!(at = %at, "reset alarm armed");
        }
        armed
    }

    /// Re-arm when the stored alarm is missing or already passed.
    fn ensure_armed(&self, ctx: &ResetContext<'_>, now: DateTime<FixedOffset>) {
        match kv::read_timestamp(ctx.store, keys::RESET_SCHEDULED_FOR) {
            Ok(Some(at)) if at > now => {}
            Ok(_) => {
                self.arm(ctx, now);
            }
            Err(e) => tracing::warn!(error = %e, "could not read reset alarm"),
        }
    }

    pub fn scheduled_for(store: &dyn KvStore) -> Result<Option<DateTime<FixedOffset>>, StoreError> {
        kv::read_timestamp(store, keys::RESET_SCHEDULED_FOR)
    }
}

fn report_events(report: &ResetReport, now: DateTime<FixedOffset>) -> Vec<Event> {
    if report.recorded {
        if !report.unblocked {
            tracing::warn!(date = %report.date, "reset recorded but unblock failed, will retry");
        }
        vec![Event::ResetPerformed {
            date: report.date,
            trigger: report.trigger,
            at: now,
        }]
    } else {
        tracing::error!(?report, "daily reset incomplete, will retry");
        Vec::new()
    }
}

fn step<E: std::fmt::Display>(name: &str, result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(step = name, error = %e, "reset step failed");
            false
        }
    }
}
