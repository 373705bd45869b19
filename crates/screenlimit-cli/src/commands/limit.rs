use clap::Subcommand;
use screenlimit_core::limits::{clear_daily_limit, load_daily_limit, save_daily_limit};
use screenlimit_core::Database;

use super::CommandResult;

#[derive(Subcommand)]
pub enum LimitAction {
    /// Set the daily limit
    Set {
        /// Minutes per day across all monitored apps
        minutes: u64,
    },
    /// Remove the daily limit
    Clear,
    /// Print the daily limit in minutes (0 when unset)
    Show,
}

pub fn run(action: LimitAction) -> CommandResult {
    let db = Database::open()?;
    match action {
        LimitAction::Set { minutes } => {
            save_daily_limit(&db, minutes)?;
            println!("daily limit set to {minutes} minutes");
        }
        LimitAction::Clear => {
            clear_daily_limit(&db)?;
            println!("daily limit cleared");
        }
        LimitAction::Show => {
            println!("{}", load_daily_limit(&db)?);
        }
    }
    Ok(())
}
