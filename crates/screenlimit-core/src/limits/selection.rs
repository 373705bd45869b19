use std::collections::BTreeSet;

use crate::error::{CoreError, StoreError, ValidationError};
use crate::storage::kv::{self, keys, KvStore};

/// Application identifiers the user chose to limit.
pub type MonitoredSet = BTreeSet<String>;

/// A day has 1440 minutes; anything larger can never be reached.
pub const MAX_DAILY_LIMIT_MINUTES: u64 = 24 * 60;

/// Blank entries are dropped; a corrupt value reads as empty.
pub fn load_monitored_set(store: &dyn KvStore) -> Result<MonitoredSet, StoreError> {
    let apps: Vec<String> = kv::read_json(store, keys::SELECTED_APPS)?;
    Ok(apps
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect())
}

/// Validate and persist the monitored set. Returns what was stored.
///
/// # Errors
/// Returns a validation error for blank identifiers or a set larger than
/// `max_apps`, or a store error if the write fails.
pub fn save_monitored_set<I>(store: &dyn KvStore, apps: I, max_apps: usize) -> Result<MonitoredSet, CoreError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut set = MonitoredSet::new();
    for app in apps {
        let app = app.as_ref().trim();
        if app.is_empty() {
            return Err(ValidationError::EmptyAppId.into());
        }
        set.insert(app.to_string());
    }
    if set.len() > max_apps {
        return Err(ValidationError::TooManyApps {
            max: max_apps,
            len: set.len(),
        }
        .into());
    }

    let list: Vec<&String> = set.iter().collect();
    kv::write_json(store, keys::SELECTED_APPS, &list)?;
    Ok(set)
}

/// Daily limit in minutes; 0 means no limit is configured.
pub fn load_daily_limit(store: &dyn KvStore) -> Result<u64, StoreError> {
    kv::read_u64(store, keys::TOTAL_MINUTES)
}

/// # Errors
/// Rejects 0 (use [`clear_daily_limit`]) and limits longer than a day.
pub fn save_daily_limit(store: &dyn KvStore, minutes: u64) -> Result<(), CoreError> {
    if minutes == 0 || minutes > MAX_DAILY_LIMIT_MINUTES {
        return Err(ValidationError::InvalidValue {
            field: keys::TOTAL_MINUTES.to_string(),
            message: format!("must be between 1 and {MAX_DAILY_LIMIT_MINUTES} minutes"),
        }
        .into());
    }
    kv::write_u64(store, keys::TOTAL_MINUTES, minutes)?;
    Ok(())
}

pub fn clear_daily_limit(store: &dyn KvStore) -> Result<(), StoreError> {
    store.remove(keys::TOTAL_MINUTES)
}
