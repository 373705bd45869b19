use std::sync::Arc;

use screenlimit_core::{Config, EnforcementEngine, Event, SystemClock};

use super::CommandResult;
use crate::host;

pub fn run(force: bool) -> CommandResult {
    let config = Config::load()?;
    let host = host::build(&config, false)?;
    let mut engine = EnforcementEngine::new(host, Arc::new(SystemClock), config);

    if force {
        let (report, _) = engine.force_reset();
        if !report.is_complete() {
            return Err("reset incomplete, see log for the failed step".into());
        }
        println!("usage reset for {}", report.date);
        return Ok(());
    }

    let events = engine.check_reset();
    let performed = events.iter().find_map(|e| match e {
        Event::ResetPerformed { date, .. } => Some(*date),
        _ => None,
    });
    match performed {
        Some(date) => println!("usage reset for {date}"),
        None if events
            .iter()
            .any(|e| matches!(e, Event::BaselineRecorded { .. })) =>
        {
            println!("reset baseline recorded")
        }
        None => println!("reset not due"),
    }
    Ok(())
}
