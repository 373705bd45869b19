//! TOML-based engine configuration.
//!
//! Stores the tunables of the enforcement engine:
//! - Cadences of the four periodic checks
//! - Enforcement limits (monitored-set size, overlay throttle, reset window)
//! - Desktop host settings used by the CLI
//!
//! User data (monitored apps, daily limit, reminder settings) lives in the
//! key-value store instead. Configuration is stored at
//! `~/.config/screenlimit/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

/// How often each periodic check runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CadenceConfig {
    #[serde(default = "default_accumulate_secs")]
    pub accumulate_secs: u64,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_threshold_check_secs")]
    pub threshold_check_secs: u64,
    #[serde(default = "default_reset_check_secs")]
    pub reset_check_secs: u64,
}

/// Where the threshold machine reads today's aggregate usage from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UsageSource {
    /// The persisted per-second foreground counter.
    #[default]
    Counter,
    /// Platform-reported usage statistics.
    Platform,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitsConfig {
    #[serde(default = "default_max_monitored_apps")]
    pub max_monitored_apps: usize,
    #[serde(default = "default_overlay_throttle_secs")]
    pub overlay_throttle_secs: u64,
    /// Minimum time since the last reset before a missed reset is caught up.
    #[serde(default = "default_missed_reset_window_hours")]
    pub missed_reset_window_hours: u64,
    /// A running token from another process whose heartbeat is older than
    /// this is treated as abandoned.
    #[serde(default = "default_stale_session_secs")]
    pub stale_session_secs: u64,
    #[serde(default)]
    pub usage_source: UsageSource,
}

/// Desktop host settings (CLI only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    /// Command printing the foreground application identifier.
    #[serde(default = "default_foreground_command")]
    pub foreground_command: Vec<String>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/screenlimit/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub host: HostConfig,
}

fn default_accumulate_secs() -> u64 {
    1
}
fn default_poll_secs() -> u64 {
    5
}
fn default_threshold_check_secs() -> u64 {
    30
}
fn default_reset_check_secs() -> u64 {
    60
}
fn default_max_monitored_apps() -> usize {
    10
}
fn default_overlay_throttle_secs() -> u64 {
    30
}
fn default_missed_reset_window_hours() -> u64 {
    23
}
fn default_stale_session_secs() -> u64 {
    15
}
fn default_foreground_command() -> Vec<String> {
    vec![
        "xdotool".to_string(),
        "getactivewindow".to_string(),
        "getwindowclassname".to_string(),
    ]
}
fn default_probe_timeout_ms() -> u64 {
    1000
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            accumulate_secs: default_accumulate_secs(),
            poll_secs: default_poll_secs(),
            threshold_check_secs: default_threshold_check_secs(),
            reset_check_secs: default_reset_check_secs(),
        }
    }
}

impl CadenceConfig {
    pub fn accumulate(&self) -> Duration {
        Duration::from_secs(self.accumulate_secs.max(1))
    }

    pub fn poll(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }

    pub fn threshold_check(&self) -> Duration {
        Duration::from_secs(self.threshold_check_secs.max(1))
    }

    pub fn reset_check(&self) -> Duration {
        Duration::from_secs(self.reset_check_secs.max(1))
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_monitored_apps: default_max_monitored_apps(),
            overlay_throttle_secs: default_overlay_throttle_secs(),
            missed_reset_window_hours: default_missed_reset_window_hours(),
            stale_session_secs: default_stale_session_secs(),
            usage_source: UsageSource::Counter,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            foreground_command: default_foreground_command(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

pub(crate) fn get_json_value_by_path<'a>(
    root: &'a serde_json::Value,
    key: &str,
) -> Option<&'a serde_json::Value> {
    if key.is_empty() {
        return None;
    }

    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Replace the leaf at `key`, parsing `value` as the type already stored there.
pub(crate) fn set_json_value_by_path(
    root: &mut serde_json::Value,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    let unknown = || ConfigError::UnknownKey(key.to_string());
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let mut parts = key.split('.').peekable();
    if key.is_empty() {
        return Err(unknown());
    }

    let mut current = root;
    while let Some(part) = parts.next() {
        let is_leaf = parts.peek().is_none();
        if is_leaf {
            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                // Unset optionals are stored as null; keep the raw string.
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        current = current.get_mut(part).ok_or_else(unknown)?;
    }

    Err(unknown())
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing defaults when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        let cadences = [
            ("cadence.accumulate_secs", self.cadence.accumulate_secs),
            ("cadence.poll_secs", self.cadence.poll_secs),
            ("cadence.threshold_check_secs", self.cadence.threshold_check_secs),
            ("cadence.reset_check_secs", self.cadence.reset_check_secs),
        ];
        for (key, secs) in cadences {
            if secs == 0 {
                return Err(invalid(key, "must be at least 1 second"));
            }
        }
        if self.limits.max_monitored_apps == 0 {
            return Err(invalid("limits.max_monitored_apps", "must be at least 1"));
        }
        if !(1..=24).contains(&self.limits.missed_reset_window_hours) {
            return Err(invalid("limits.missed_reset_window_hours", "must be between 1 and 24"));
        }
        if self.host.foreground_command.is_empty() {
            return Err(invalid("host.foreground_command", "must name a program"));
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn overlay_throttle(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.limits.overlay_throttle_secs as i64)
    }

    pub fn missed_reset_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.limits.missed_reset_window_hours as i64)
    }

    pub fn stale_session(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.limits.stale_session_secs as i64)
    }
}
