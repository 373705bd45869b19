use screenlimit_core::storage::kv::{self, keys};
use screenlimit_core::{Database, Stage, UsageSnapshot};

use super::CommandResult;

pub fn run(json: bool) -> CommandResult {
    let db = Database::open()?;
    let snapshot = UsageSnapshot::load(&db)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.limit_minutes == 0 {
        println!("limit:     none");
    } else {
        println!("limit:     {} min", snapshot.limit_minutes);
    }
    println!(
        "used:      {}m {:02}s",
        snapshot.counter_secs / 60,
        snapshot.counter_secs % 60
    );
    println!(
        "remaining: {}m {:02}s",
        snapshot.remaining_secs / 60,
        snapshot.remaining_secs % 60
    );
    let stage = match snapshot.stage {
        Stage::Normal => "normal",
        Stage::FirstWarned => "first warning sent",
        Stage::SecondWarned => "final warning sent",
        Stage::Blocked => "blocked",
    };
    println!("stage:     {stage}");
    println!(
        "apps:      {}",
        if snapshot.monitored.is_empty() {
            "-".to_string()
        } else {
            snapshot.monitored.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    );
    let blocked: Vec<String> = kv::read_json(&db, keys::BLOCKED_APPS)?;
    if !blocked.is_empty() {
        println!("blocked:   {}", blocked.join(", "));
    }
    if snapshot.session_active {
        println!("session:   active");
    }
    if let Some(date) = snapshot.last_reset_date {
        println!("reset:     {date}");
    }
    if let Some(next) = snapshot.next_reset_at {
        println!("next:      {}", next.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}
