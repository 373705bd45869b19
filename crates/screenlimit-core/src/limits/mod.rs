//! Daily limit bookkeeping and the threshold state machine.
//!
//! The monitored set and the daily limit are written by the host UI and read
//! by the engine. Reminder progress is owned by [`ThresholdMachine`].

mod selection;
mod snapshot;
mod state;
mod threshold;

pub use selection::{
    clear_daily_limit, load_daily_limit, load_monitored_set, save_daily_limit,
    save_monitored_set, MonitoredSet, MAX_DAILY_LIMIT_MINUTES,
};
pub use snapshot::UsageSnapshot;
pub use state::{ReminderState, Stage};
pub use threshold::{OverlayThrottle, ThresholdContext, ThresholdMachine, Thresholds};
