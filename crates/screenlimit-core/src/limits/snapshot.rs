use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use super::selection::{load_daily_limit, load_monitored_set, MonitoredSet};
use super::state::{ReminderState, Stage};
use crate::error::StoreError;
use crate::storage::kv::{self, keys, KvStore};

/// Read-only view of today's enforcement state, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub monitored: MonitoredSet,
    pub limit_minutes: u64,
    pub counter_secs: u64,
    pub remaining_secs: u64,
    pub reminder_state: ReminderState,
    pub stage: Stage,
    pub session_active: bool,
    pub last_reset_date: Option<NaiveDate>,
    pub last_reset_at: Option<DateTime<FixedOffset>>,
    pub next_reset_at: Option<DateTime<FixedOffset>>,
}

impl UsageSnapshot {
    pub fn load(store: &dyn KvStore) -> Result<Self, StoreError> {
        let limit_minutes = load_daily_limit(store)?;
        let counter_secs = kv::read_u64(store, keys::COUNTER)?;
        let reminder_state = ReminderState::load(store)?;

        Ok(Self {
            monitored: load_monitored_set(store)?,
            limit_minutes,
            counter_secs,
            remaining_secs: limit_minutes.saturating_mul(60).saturating_sub(counter_secs),
            stage: reminder_state.stage(),
            reminder_state,
            session_active: store.get(keys::IS_TASK_RUNNING)?.is_some(),
            last_reset_date: kv::read_date(store, keys::LAST_RESET_DATE)?,
            last_reset_at: kv::read_timestamp(store, keys::LAST_RESET_TIMESTAMP)?,
            next_reset_at: kv::read_timestamp(store, keys::RESET_SCHEDULED_FOR)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn snapshot_of_fresh_store() {
        let store = MemoryStore::new();
        let snapshot = UsageSnapshot::load(&store).unwrap();
        assert_eq!(snapshot.limit_minutes, 0);
        assert_eq!(snapshot.stage, Stage::Normal);
        assert!(!snapshot.session_active);
        assert!(snapshot.last_reset_date.is_none());
    }

    #[test]
    fn snapshot_reports_remaining_time() {
        let store = MemoryStore::new();
        kv::write_u64(&store, keys::TOTAL_MINUTES, 30).unwrap();
        kv::write_u64(&store, keys::COUNTER, 600).unwrap();
        let snapshot = UsageSnapshot::load(&store).unwrap();
        assert_eq!(snapshot.remaining_secs, 1200);
    }
}
