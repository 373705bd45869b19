use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, StoreError};
use crate::storage::config::{get_json_value_by_path, set_json_value_by_path};
use crate::storage::kv::{self, keys, KvStore};

/// User-facing reminder preferences, stored as one JSON blob so the host UI
/// can edit it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReminderSettings {
    pub enabled: bool,
    /// Minutes before the limit for the first warning.
    pub first_lead_minutes: u64,
    /// Minutes before the limit for the final warning.
    pub second_lead_minutes: u64,
    /// Seconds before the limit for the in-session warning; 0 disables it.
    pub approaching_lead_seconds: u64,
    pub notification_enabled: bool,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub overlay_enabled: bool,
    pub first_message: Option<String>,
    pub final_message: Option<String>,
    pub limit_message: Option<String>,
    pub approaching_message: Option<String>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            first_lead_minutes: 10,
            second_lead_minutes: 5,
            approaching_lead_seconds: 60,
            notification_enabled: true,
            sound_enabled: true,
            vibration_enabled: true,
            overlay_enabled: false,
            first_message: None,
            final_message: None,
            limit_message: None,
            approaching_message: None,
        }
    }
}

impl ReminderSettings {
    /// Missing or corrupt settings read as defaults.
    pub fn load(store: &dyn KvStore) -> Result<Self, StoreError> {
        kv::read_json(store, keys::REMINDER_SETTINGS)
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<(), CoreError> {
        self.validate()?;
        kv::write_json(store, keys::REMINDER_SETTINGS, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.second_lead_minutes > self.first_lead_minutes {
            return Err(ConfigError::InvalidValue {
                key: "secondLeadMinutes".into(),
                message: "final warning must not come before the first warning".into(),
            });
        }
        if self.first_lead_minutes > 24 * 60 {
            return Err(ConfigError::InvalidValue {
                key: "firstLeadMinutes".into(),
                message: "must be at most 1440".into(),
            });
        }
        Ok(())
    }

    /// Read one field by its camelCase name.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match get_json_value_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Update one field by its camelCase name. Nothing is persisted.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        set_json_value_by_path(&mut json, key, value)?;
        let updated: Self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
