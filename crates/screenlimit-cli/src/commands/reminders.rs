use clap::Subcommand;
use screenlimit_core::{Database, ReminderSettings};

use super::CommandResult;

#[derive(Subcommand)]
pub enum RemindersAction {
    /// Print reminder settings as JSON
    Show,
    /// Get one setting
    Get {
        /// Setting name (e.g. "firstLeadMinutes", "soundEnabled")
        key: String,
    },
    /// Change one setting
    Set {
        key: String,
        value: String,
    },
    /// Restore default reminder settings
    Reset,
}

pub fn run(action: RemindersAction) -> CommandResult {
    let db = Database::open()?;
    match action {
        RemindersAction::Show => {
            let settings = ReminderSettings::load(&db)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        RemindersAction::Get { key } => {
            let settings = ReminderSettings::load(&db)?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown setting: {key}").into()),
            }
        }
        RemindersAction::Set { key, value } => {
            let mut settings = ReminderSettings::load(&db)?;
            settings.apply(&key, &value)?;
            settings.save(&db)?;
            println!("ok");
        }
        RemindersAction::Reset => {
            ReminderSettings::default().save(&db)?;
            println!("reminder settings reset to defaults");
        }
    }
    Ok(())
}
