//! Usage poller.
//!
//! Two caller-driven cadences: [`UsagePoller::poll`] watches for a monitored
//! app in the foreground and starts a session, [`UsagePoller::tick`] adds one
//! second to the persisted counter while the session lasts.
//!
//! ```text
//! Idle --poll(monitored in front)--> Accumulating --tick(left / limit)--> Idle
//! ```
//!
//! A [`RunningToken`] in the store marks the active session so a second
//! poller (another process, or this one after a crash) never double-counts.
//! Tokens whose heartbeat is older than the stale threshold are abandoned
//! and may be taken over.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::events::{Event, SessionEndReason};
use crate::limits::{load_daily_limit, load_monitored_set, MonitoredSet};
use crate::platform::{AppBlocker, ForegroundProbe};
use crate::reminder::ReminderSettings;
use crate::storage::kv::{self, keys, KvStore};

/// Persisted under `isTaskRunning` while a session accumulates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningToken {
    pub generation: Uuid,
    pub app: String,
    pub heartbeat: DateTime<FixedOffset>,
}

pub struct PollerContext<'a> {
    pub store: &'a dyn KvStore,
    pub probe: &'a dyn ForegroundProbe,
    pub blocker: &'a dyn AppBlocker,
}

pub struct UsagePoller {
    generation: Uuid,
    stale_after: Duration,
    /// App of the running session.
    session: Option<String>,
}

impl UsagePoller {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            generation: Uuid::new_v4(),
            stale_after,
            session: None,
        }
    }

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn is_accumulating(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_app(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Outer cadence: start a session when a monitored app is in front.
    pub fn poll(
        &mut self,
        ctx: &PollerContext<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, CoreError> {
        if self.session.is_some() {
            return Ok(Vec::new());
        }

        let limit = load_daily_limit(ctx.store)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let monitored = load_monitored_set(ctx.store)?;
        let Some(app) = ctx.probe.foreground_app() else {
            return Ok(Vec::new());
        };
        if !monitored.contains(&app) {
            return Ok(Vec::new());
        }
        if kv::read_u64(ctx.store, keys::COUNTER)? >= limit.saturating_mul(60) {
            // Already spent; the threshold check owns enforcement from here.
            return Ok(Vec::new());
        }

        if let Some(token) = kv::read_json_opt::<RunningToken>(ctx.store, keys::IS_TASK_RUNNING)? {
            if token.generation != self.generation {
                if !self.is_stale(&token, now) {
                    tracing::debug!(owner = %token.generation, "session owned by another poller");
                    return Ok(Vec::new());
                }
                tracing::warn!(
                    owner = %token.generation,
                    heartbeat = %token.heartbeat,
                    "taking over abandoned session"
                );
            }
        }

        self.write_token(ctx.store, &app, now)?;
        tracing::info!(app = %app, "usage session started");
        self.session = Some(app.clone());
        Ok(vec![Event::SessionStarted { app, at: now }])
    }

    /// Inner cadence: count one second of foreground use.
    ///
    /// # Errors
    /// Any store failure ends the session, releases the token and is
    /// returned to the caller.
    pub fn tick(
        &mut self,
        ctx: &PollerContext<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, CoreError> {
        if self.session.is_none() {
            return Ok(Vec::new());
        }
        match self.advance(ctx, now) {
            Ok(events) => Ok(events),
            Err(e) => {
                tracing::error!(error = %e, "usage tick failed, ending session");
                self.session = None;
                self.release(ctx.store);
                Err(e)
            }
        }
    }

    /// End the session, if any, and release the token.
    pub fn stop(&mut self, store: &dyn KvStore, now: DateTime<FixedOffset>) -> Vec<Event> {
        if self.session.is_none() {
            return Vec::new();
        }
        let counter = kv::read_u64(store, keys::COUNTER).unwrap_or_default();
        self.end(store, SessionEndReason::Stopped, counter, now)
    }

    fn advance(
        &mut self,
        ctx: &PollerContext<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, CoreError> {
        match kv::read_json_opt::<RunningToken>(ctx.store, keys::IS_TASK_RUNNING)? {
            Some(token) if token.generation != self.generation => {
                tracing::warn!(owner = %token.generation, "session taken over by another poller");
                self.session = None;
                let counter = kv::read_u64(ctx.store, keys::COUNTER)?;
                return Ok(vec![Event::SessionEnded {
                    reason: SessionEndReason::Superseded,
                    counter_secs: counter,
                    at: now,
                }]);
            }
            _ => {}
        }

        let monitored = load_monitored_set(ctx.store)?;
        let counter = kv::read_u64(ctx.store, keys::COUNTER)?;

        let foreground = ctx
            .probe
            .foreground_app()
            .filter(|app| monitored.contains(app));
        let Some(app) = foreground else {
            return Ok(self.end(ctx.store, SessionEndReason::LeftForeground, counter, now));
        };

        let limit = load_daily_limit(ctx.store)?;
        if limit == 0 {
            return Ok(self.end(ctx.store, SessionEndReason::LimitCleared, counter, now));
        }
        let limit_secs = limit.saturating_mul(60);
        if counter >= limit_secs {
            return Ok(self.reach_limit(ctx, &monitored, counter, now));
        }

        let lead_secs = ReminderSettings::load(ctx.store)?.approaching_lead_seconds;
        let next = counter + 1;

        self.write_token(ctx.store, &app, now)?;
        // Counter last: a failure above leaves it untouched.
        kv::write_u64(ctx.store, keys::COUNTER, next)?;
        self.session = Some(app.clone());

        let mut events = vec![Event::UsageTicked {
            app,
            counter_secs: next,
            at: now,
        }];
        if lead_secs > 0 && lead_secs < limit_secs && next == limit_secs - lead_secs {
            events.push(Event::LimitApproaching {
                counter_secs: next,
                remaining_secs: lead_secs,
                at: now,
            });
        }
        if next >= limit_secs {
            events.extend(self.reach_limit(ctx, &monitored, next, now));
        }
        Ok(events)
    }

    fn reach_limit(
        &mut self,
        ctx: &PollerContext<'_>,
        monitored: &MonitoredSet,
        counter: u64,
        now: DateTime<FixedOffset>,
    ) -> Vec<Event> {
        tracing::info!(counter, "daily limit reached");
        if let Err(e) = ctx.blocker.set_blocked_apps(monitored) {
            tracing::warn!(error = %e, "failed to block at limit, threshold check will retry");
        }
        let mut events = vec![Event::LimitReached {
            counter_secs: counter,
            at: now,
        }];
        events.extend(self.end(ctx.store, SessionEndReason::LimitReached, counter, now));
        events
    }

    fn end(
        &mut self,
        store: &dyn KvStore,
        reason: SessionEndReason,
        counter: u64,
        now: DateTime<FixedOffset>,
    ) -> Vec<Event> {
        tracing::info!(?reason, counter, "usage session ended");
        self.session = None;
        self.release(store);
        vec![Event::SessionEnded {
            reason,
            counter_secs: counter,
            at: now,
        }]
    }

    /// Remove the token if this poller owns it.
    fn release(&self, store: &dyn KvStore) {
        let owned = match kv::read_json_opt::<RunningToken>(store, keys::IS_TASK_RUNNING) {
            Ok(Some(token)) => token.generation == self.generation,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "could not read session token");
                return;
            }
        };
        if owned {
            if let Err(e) = store.remove(keys::IS_TASK_RUNNING) {
                tracing::warn!(error = %e, "could not release session token");
            }
        }
    }

    fn write_token(
        &self,
        store: &dyn KvStore,
        app: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<(), CoreError> {
        let token = RunningToken {
            generation: self.generation,
            app: app.to_string(),
            heartbeat: now,
        };
        kv::write_json(store, keys::IS_TASK_RUNNING, &token)?;
        Ok(())
    }

    fn is_stale(&self, token: &RunningToken, now: DateTime<FixedOffset>) -> bool {
        // A heartbeat far in the future means the clock moved backwards.
        (now - token.heartbeat).abs() > self.stale_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{FakeBlocker, FakeProbe};
    use crate::storage::MemoryStore;

    struct Rig {
        store: MemoryStore,
        probe: FakeProbe,
        blocker: FakeBlocker,
    }

    impl Rig {
        fn new(limit: u64) -> Self {
            let store = MemoryStore::new();
            kv::write_u64(&store, keys::TOTAL_MINUTES, limit).unwrap();
            store.set(keys::SELECTED_APPS, r#"["com.video"]"#).unwrap();
            Self {
                store,
                probe: FakeProbe::new(),
                blocker: FakeBlocker::new(),
            }
        }

        fn ctx(&self) -> PollerContext<'_> {
            PollerContext {
                store: &self.store,
                probe: &self.probe,
                blocker: &self.blocker,
            }
        }

        fn counter(&self) -> u64 {
            kv::read_u64(&self.store, keys::COUNTER).unwrap()
        }
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn poll_ignores_unmonitored_apps() {
        let rig = Rig::new(10);
        let mut poller = UsagePoller::new(Duration::seconds(15));
        rig.probe.set_foreground(Some("com.editor"));

        let events = poller.poll(&rig.ctx(), at("2024-03-10T10:00:00+00:00")).unwrap();
        assert!(events.is_empty());
        assert!(!poller.is_accumulating());
        assert!(rig.store.get(keys::IS_TASK_RUNNING).unwrap().is_none());
    }

    #[test]
    fn poll_without_limit_is_idle() {
        let rig = Rig::new(0);
        let mut poller = UsagePoller::new(Duration::seconds(15));
        rig.probe.set_foreground(Some("com.video"));
        assert!(poller.poll(&rig.ctx(), at("2024-03-10T10:00:00+00:00")).unwrap().is_empty());
    }

    #[test]
    fn session_counts_until_app_leaves() {
        let rig = Rig::new(10);
        let mut poller = UsagePoller::new(Duration::seconds(15));
        let start = at("2024-03-10T10:00:00+00:00");
        rig.probe.set_foreground(Some("com.video"));

        let events = poller.poll(&rig.ctx(), start).unwrap();
        assert!(matches!(events[0], Event::SessionStarted { .. }));

        for i in 1..=3 {
            poller.tick(&rig.ctx(), start + Duration::seconds(i)).unwrap();
        }
        assert_eq!(rig.counter(), 3);

        rig.probe.set_foreground(None);
        let events = poller.tick(&rig.ctx(), start + Duration::seconds(4)).unwrap();
        assert!(matches!(
            events[..],
            [Event::SessionEnded {
                reason: SessionEndReason::LeftForeground,
                counter_secs: 3,
                ..
            }]
        ));
        assert_eq!(rig.counter(), 3);
        assert!(rig.store.get(keys::IS_TASK_RUNNING).unwrap().is_none());
    }

    #[test]
    fn fresh_foreign_token_is_respected() {
        let rig = Rig::new(10);
        let now = at("2024-03-10T10:00:00+00:00");
        let other = RunningToken {
            generation: Uuid::new_v4(),
            app: "com.video".into(),
            heartbeat: now - Duration::seconds(3),
        };
        kv::write_json(&rig.store, keys::IS_TASK_RUNNING, &other).unwrap();
        rig.probe.set_foreground(Some("com.video"));

        let mut poller = UsagePoller::new(Duration::seconds(15));
        assert!(poller.poll(&rig.ctx(), now).unwrap().is_empty());
        assert!(!poller.is_accumulating());
    }

    #[test]
    fn stale_foreign_token_is_taken_over() {
        let rig = Rig::new(10);
        let now = at("2024-03-10T10:00:00+00:00");
        let other = RunningToken {
            generation: Uuid::new_v4(),
            app: "com.video".into(),
            heartbeat: now - Duration::minutes(5),
        };
        kv::write_json(&rig.store, keys::IS_TASK_RUNNING, &other).unwrap();
        rig.probe.set_foreground(Some("com.video"));

        let mut poller = UsagePoller::new(Duration::seconds(15));
        poller.poll(&rig.ctx(), now).unwrap();
        assert!(poller.is_accumulating());
        let token: RunningToken = kv::read_json_opt(&rig.store, keys::IS_TASK_RUNNING)
            .unwrap()
            .unwrap();
        assert_eq!(token.generation, poller.generation());
    }

    #[test]
    fn store_failure_aborts_tick_and_ends_session() {
        let rig = Rig::new(10);
        let mut poller = UsagePoller::new(Duration::seconds(15));
        let start = at("2024-03-10T10:00:00+00:00");
        rig.probe.set_foreground(Some("com.video"));
        poller.poll(&rig.ctx(), start).unwrap();

        rig.store.fail_writes(true);
        assert!(poller.tick(&rig.ctx(), start + Duration::seconds(1)).is_err());
        assert!(!poller.is_accumulating());

        rig.store.fail_writes(false);
        assert_eq!(rig.counter(), 0);
    }

    #[test]
    fn approaching_then_limit_blocks() {
        let rig = Rig::new(1);
        let mut poller = UsagePoller::new(Duration::seconds(15));
        let start = at("2024-03-10T10:00:00+00:00");
        kv::write_u64(&rig.store, keys::COUNTER, 58).unwrap();
        rig.probe.set_foreground(Some("com.video"));
        poller.poll(&rig.ctx(), start).unwrap();

        let events = poller.tick(&rig.ctx(), start + Duration::seconds(1)).unwrap();
        assert_eq!(rig.counter(), 59);
        assert!(!events.iter().any(|e| matches!(e, Event::LimitReached { .. })));

        let events = poller.tick(&rig.ctx(), start + Duration::seconds(2)).unwrap();
        assert_eq!(rig.counter(), 60);
        assert!(events.iter().any(|e| matches!(e, Event::LimitReached { counter_secs: 60, .. })));
        assert!(!poller.is_accumulating());
        assert_eq!(rig.blocker.blocked().len(), 1);
    }

    #[test]
    fn approaching_fires_at_lead() {
        let rig = Rig::new(2);
        let mut poller = UsagePoller::new(Duration::seconds(15));
        let start = at("2024-03-10T10:00:00+00:00");
        kv::write_u64(&rig.store, keys::COUNTER, 59).unwrap();
        rig.probe.set_foreground(Some("com.video"));
        poller.poll(&rig.ctx(), start).unwrap();

        let events = poller.tick(&rig.ctx(), start + Duration::seconds(1)).unwrap();
        assert!(events.contains(&Event::LimitApproaching {
            counter_secs: 60,
            remaining_secs: 60,
            at: start + Duration::seconds(1),
        }));
    }
}
