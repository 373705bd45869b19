use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::storage::kv::{self, keys, KvStore};

/// Enforcement progress for the current day.
///
/// Flags only move from false to true within a day; the daily reset is the
/// only thing that clears them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReminderState {
    pub first_reminder_sent: bool,
    pub second_reminder_sent: bool,
    pub block_applied: bool,
}

impl ReminderState {
    pub fn load(store: &dyn KvStore) -> Result<Self, StoreError> {
        kv::read_json(store, keys::REMINDER_STATE)
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<(), StoreError> {
        kv::write_json(store, keys::REMINDER_STATE, self)
    }

    pub fn stage(&self) -> Stage {
        if self.block_applied {
            Stage::Blocked
        } else if self.second_reminder_sent {
            Stage::SecondWarned
        } else if self.first_reminder_sent {
            Stage::FirstWarned
        } else {
            Stage::Normal
        }
    }
}

/// Threshold progression, ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normal,
    FirstWarned,
    SecondWarned,
    Blocked,
}
