//! Foreground usage accounting.

mod aggregate;
mod poller;

pub use aggregate::{aggregate_minutes, counter_minutes};
pub use poller::{PollerContext, RunningToken, UsagePoller};
