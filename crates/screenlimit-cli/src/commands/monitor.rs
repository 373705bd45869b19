use std::sync::Arc;

use clap::Subcommand;
use screenlimit_core::{Config, EnforcementEngine, MonitorRuntime, SystemClock};
use tokio::sync::broadcast::error::RecvError;

use super::CommandResult;
use crate::host;

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Run until interrupted, printing engine events as JSON lines
    Run {
        /// Track usage and send reminders without blocking anything
        #[arg(long)]
        dry_run: bool,
    },
}

pub fn run(action: MonitorAction) -> CommandResult {
    match action {
        MonitorAction::Run { dry_run } => {
            let config = Config::load()?;
            let host = host::build(&config, dry_run)?;
            let engine = EnforcementEngine::new(host, Arc::new(SystemClock), config);

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(monitor(engine))
        }
    }
}

async fn monitor(engine: EnforcementEngine) -> CommandResult {
    let handle = MonitorRuntime::spawn(engine);
    let mut events = handle.subscribe();
    tracing::info!("monitoring, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event output fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    handle.stop().await;
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
