//! Reminder content, user settings and delivery.

mod dispatch;
mod message;
mod settings;

pub use dispatch::{DispatchReport, ReminderDispatcher, REMINDER_VIBRATION};
pub use message::render;
pub use settings::ReminderSettings;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// The counter is within the approaching lead of the limit.
    Approaching,
    FirstWarning,
    FinalWarning,
    LimitReached,
    /// Informational notice after the daily reset.
    ResetDone,
}

impl ReminderKind {
    /// Warnings are suppressed when reminders are disabled; limit and reset
    /// notices are not.
    pub fn is_warning(self) -> bool {
        matches!(self, Self::Approaching | Self::FirstWarning | Self::FinalWarning)
    }

    /// Kinds that may also be rendered as an in-app overlay.
    pub fn has_overlay(self) -> bool {
        self.is_warning()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reminder {
    pub kind: ReminderKind,
    pub remaining_minutes: u64,
}

impl Reminder {
    pub fn new(kind: ReminderKind, remaining_minutes: u64) -> Self {
        Self {
            kind,
            remaining_minutes,
        }
    }
}
