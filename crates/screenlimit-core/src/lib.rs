//! # Screenlimit Core Library
//!
//! Daily screen-time enforcement: counts foreground time spent in a chosen
//! set of applications, warns as the daily limit approaches, blocks the
//! applications once it is reached and clears everything at midnight.
//!
//! ## Architecture
//!
//! - **Usage Poller**: starts a session when a monitored app is in front and
//!   adds one second per tick to a persisted counter
//! - **Threshold State Machine**: derives warning and block stages from the
//!   limit and keeps the block enforced
//! - **Daily Reset Scheduler**: clears the day's state once per calendar day,
//!   catching up after missed midnights
//! - **Reminder Dispatch**: notification with permission prompting and
//!   sound/vibration fallback
//!
//! Each component is a caller-driven state machine. [`EnforcementEngine`]
//! routes events between them and [`MonitorRuntime`] drives the cadences on
//! tokio. Host capabilities come in through the traits in [`platform`].
//!
//! ## Key Components
//!
//! - [`EnforcementEngine`]: the composed engine
//! - [`Database`]: SQLite key-value store shared with the host UI
//! - [`Config`]: cadence and limit tuning from `config.toml`

pub mod clock;
pub mod error;
pub mod events;
pub mod limits;
pub mod monitor;
pub mod platform;
pub mod reminder;
pub mod reset;
pub mod storage;
pub mod usage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, PlatformError, StoreError, ValidationError};
pub use events::{Event, ResetTrigger, SessionEndReason};
pub use limits::{MonitoredSet, ReminderState, Stage, Thresholds, UsageSnapshot};
pub use monitor::{EnforcementEngine, MonitorHandle, MonitorRuntime};
pub use platform::{Host, Permission};
pub use reminder::{ReminderKind, ReminderSettings};
pub use storage::{Config, Database, KvStore, MemoryStore, UsageSource};
