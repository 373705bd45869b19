//! Key-value access to the persistent counter store.
//!
//! Every value is a string. The typed readers here treat absent or corrupt
//! data as unset rather than failing, so a damaged counter leaves the engine
//! idle instead of crashing it. Only I/O failures surface as errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Logical key names shared with the host UI.
pub mod keys {
    pub const SELECTED_APPS: &str = "selectedApps";
    pub const TOTAL_MINUTES: &str = "totalMinutes";
    pub const COUNTER: &str = "counter";
    pub const IS_TASK_RUNNING: &str = "isTaskRunning";
    pub const LAST_RESET_DATE: &str = "lastResetDate";
    pub const LAST_RESET_TIMESTAMP: &str = "lastResetTimestamp";
    pub const RESET_SCHEDULED_FOR: &str = "resetScheduledFor";
    pub const REMINDER_STATE: &str = "reminderState";
    pub const REMINDER_SETTINGS: &str = "reminderSettings";
    /// Block list kept by hosts without a native actuator.
    pub const BLOCKED_APPS: &str = "blockedApps";
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Read-your-writes string store. No cross-key transactions.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Non-negative integer; absent or non-numeric reads as 0.
pub fn read_u64(store: &dyn KvStore, key: &str) -> Result<u64, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(0);
    };
    match raw.trim().parse::<u64>() {
        Ok(v) => Ok(v),
        Err(_) => {
            // Some hosts write numbers as floats ("12.0").
            match raw.trim().parse::<f64>() {
                Ok(f) if f.is_finite() && f >= 0.0 => Ok(f as u64),
                _ => {
                    tracing::warn!(key, value = %raw, "ignoring non-numeric value");
                    Ok(0)
                }
            }
        }
    }
}

pub fn write_u64(store: &dyn KvStore, key: &str, value: u64) -> Result<(), StoreError> {
    store.set(key, &value.to_string())
}

/// JSON value; absent or undecodable reads as `T::default()`.
pub fn read_json<T: DeserializeOwned + Default>(store: &dyn KvStore, key: &str) -> Result<T, StoreError> {
    Ok(read_json_opt(store, key)?.unwrap_or_default())
}

/// JSON value; absent or undecodable reads as `None`.
pub fn read_json_opt<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring corrupt JSON value");
            Ok(None)
        }
    }
}

pub fn write_json<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string(value).map_err(|e| StoreError::Encode {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, &json)
}

pub fn read_date(store: &dyn KvStore, key: &str) -> Result<Option<NaiveDate>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(d) => Ok(Some(d)),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed date");
            Ok(None)
        }
    }
}

pub fn write_date(store: &dyn KvStore, key: &str, date: NaiveDate) -> Result<(), StoreError> {
    store.set(key, &date.format(DATE_FORMAT).to_string())
}

pub fn read_timestamp(store: &dyn KvStore, key: &str) -> Result<Option<DateTime<FixedOffset>>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(t) => Ok(Some(t)),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed timestamp");
            Ok(None)
        }
    }
}

pub fn write_timestamp(store: &dyn KvStore, key: &str, at: DateTime<FixedOffset>) -> Result<(), StoreError> {
    store.set(key, &at.to_rfc3339())
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

/// Mutex-guarded in-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail until switched back.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make every write fail until switched back.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(StoreError::QueryFailed(format!("read of '{key}' failed")));
        }
        Ok(inner.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StoreError::QueryFailed(format!("write of '{key}' failed")));
        }
        inner.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StoreError::QueryFailed(format!("removal of '{key}' failed")));
        }
        inner.values.remove(key);
        Ok(())
    }
}
