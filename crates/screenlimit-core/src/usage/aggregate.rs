use crate::error::StoreError;
use crate::limits::MonitoredSet;
use crate::platform::UsageStats;
use crate::storage::kv::{self, keys, KvStore};

/// Whole minutes accumulated by the persisted counter.
pub fn counter_minutes(store: &dyn KvStore) -> Result<u64, StoreError> {
    Ok(kv::read_u64(store, keys::COUNTER)? / 60)
}

/// Today's platform-reported minutes summed over the monitored set.
///
/// Tries one batched query first and falls back to per-app queries. An app
/// whose query fails counts as 0.
pub fn aggregate_minutes(stats: &dyn UsageStats, monitored: &MonitoredSet) -> u64 {
    match stats.all_usage_minutes() {
        Ok(table) => monitored
            .iter()
            .map(|app| table.get(app).copied().unwrap_or(0))
            .fold(0, u64::saturating_add),
        Err(e) => {
            tracing::debug!(error = %e, "batched usage query failed, querying per app");
            monitored
                .iter()
                .map(|app| match stats.usage_minutes(app) {
                    Ok(minutes) => minutes,
                    Err(e) => {
                        tracing::warn!(app = %app, error = %e, "usage query failed, counting 0");
                        0
                    }
                })
                .fold(0, u64::saturating_add)
        }
    }
}
