//! The enforcement engine and its async driver.

mod engine;
mod runtime;

pub use engine::EnforcementEngine;
pub use runtime::{MonitorHandle, MonitorRuntime};
