use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::reminder::ReminderKind;

/// Every state change in the engine produces an Event.
/// Components return them; the engine routes the ones other components
/// react to, and the runtime republishes all of them to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A monitored app came to the foreground and accumulation began.
    SessionStarted {
        app: String,
        at: DateTime<FixedOffset>,
    },
    /// Accumulation stopped.
    SessionEnded {
        reason: SessionEndReason,
        counter_secs: u64,
        at: DateTime<FixedOffset>,
    },
    UsageTicked {
        app: String,
        counter_secs: u64,
        at: DateTime<FixedOffset>,
    },
    /// The counter hit the approaching-limit lead time.
    LimitApproaching {
        counter_secs: u64,
        remaining_secs: u64,
        at: DateTime<FixedOffset>,
    },
    /// The counter reached the daily limit and the monitored set was blocked.
    LimitReached {
        counter_secs: u64,
        at: DateTime<FixedOffset>,
    },
    /// A reminder should be shown to the user.
    ReminderDue {
        kind: ReminderKind,
        remaining_minutes: u64,
        at: DateTime<FixedOffset>,
    },
    ReminderDelivered {
        kind: ReminderKind,
        via_notification: bool,
        fallback_used: bool,
        overlay_shown: bool,
        at: DateTime<FixedOffset>,
    },
    BlockApplied {
        apps: BTreeSet<String>,
        at: DateTime<FixedOffset>,
    },
    /// The limit or the monitored set was cleared while apps were blocked.
    BlockLifted {
        at: DateTime<FixedOffset>,
    },
    BlockOverlayShown {
        app: String,
        at: DateTime<FixedOffset>,
    },
    /// A blocked app was in front again within the overlay throttle window.
    HostRefocused {
        app: String,
        at: DateTime<FixedOffset>,
    },
    ResetPerformed {
        date: NaiveDate,
        trigger: ResetTrigger,
        at: DateTime<FixedOffset>,
    },
    /// First run: reset bookkeeping initialised without clearing usage.
    BaselineRecorded {
        date: NaiveDate,
        at: DateTime<FixedOffset>,
    },
    MonitoringStopped {
        at: DateTime<FixedOffset>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    LeftForeground,
    LimitReached,
    LimitCleared,
    StoreFailure,
    /// Another poller took over the running token.
    Superseded,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTrigger {
    /// Ran within the first minute of the new day.
    Midnight,
    /// The day rolled over while the process was not running.
    CatchUp,
    /// Requested explicitly by the user.
    Forced,
}
