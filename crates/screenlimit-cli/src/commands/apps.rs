use clap::Subcommand;
use screenlimit_core::limits::{load_monitored_set, save_monitored_set};
use screenlimit_core::{Config, Database};

use super::CommandResult;

#[derive(Subcommand)]
pub enum AppsAction {
    /// Add applications to the monitored set
    Add {
        /// Application identifiers (e.g. "firefox", "com.example.game")
        #[arg(required = true)]
        apps: Vec<String>,
    },
    /// Remove applications from the monitored set
    Remove {
        #[arg(required = true)]
        apps: Vec<String>,
    },
    /// List monitored applications
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop monitoring every application
    Clear,
}

pub fn run(action: AppsAction) -> CommandResult {
    let db = Database::open()?;
    let config = Config::load()?;
    let max = config.limits.max_monitored_apps;

    match action {
        AppsAction::Add { apps } => {
            let mut set = load_monitored_set(&db)?;
            set.extend(apps);
            let saved = save_monitored_set(&db, &set, max)?;
            println!("monitoring {} app(s)", saved.len());
        }
        AppsAction::Remove { apps } => {
            let mut set = load_monitored_set(&db)?;
            for app in &apps {
                if !set.remove(app.trim()) {
                    eprintln!("not monitored: {app}");
                }
            }
            let saved = save_monitored_set(&db, &set, max)?;
            println!("monitoring {} app(s)", saved.len());
        }
        AppsAction::List { json } => {
            let set = load_monitored_set(&db)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&set)?);
            } else if set.is_empty() {
                println!("no apps monitored");
            } else {
                for app in set {
                    println!("{app}");
                }
            }
        }
        AppsAction::Clear => {
            save_monitored_set(&db, std::iter::empty::<&str>(), max)?;
            println!("monitored set cleared");
        }
    }
    Ok(())
}
