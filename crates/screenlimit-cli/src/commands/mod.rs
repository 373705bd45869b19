pub mod apps;
pub mod config;
pub mod limit;
pub mod monitor;
pub mod reminders;
pub mod reset;
pub mod status;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;
