//! Daily reset of usage and enforcement state.

mod calendar;
mod scheduler;

pub use calendar::{is_midnight_minute, next_midnight};
pub use scheduler::{evaluate, DailyResetScheduler, ResetContext, ResetDecision, ResetReport};
