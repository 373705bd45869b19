//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory.

use std::path::Path;
use std::process::Command;

use screenlimit_core::storage::kv::{self, keys};
use screenlimit_core::Database;

/// Run a CLI command and return (code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_screenlimit"))
        .args(args)
        .env("SCREENLIMIT_HOME", home)
        .env("SCREENLIMIT_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn open_db(home: &Path) -> Database {
    Database::open_at(&home.join("screenlimit.db")).unwrap()
}

#[test]
fn test_apps_add_list_remove() {
    let home = tempfile::tempdir().unwrap();
    let (code, out, _) = run_cli(home.path(), &["apps", "add", "firefox", "steam"]);
    assert_eq!(code, 0);
    assert!(out.contains("monitoring 2 app(s)"));

    let (code, out, _) = run_cli(home.path(), &["apps", "list", "--json"]);
    assert_eq!(code, 0);
    let apps: Vec<String> = serde_json::from_str(&out).unwrap();
    assert_eq!(apps, vec!["firefox", "steam"]);

    let (code, _, _) = run_cli(home.path(), &["apps", "remove", "steam"]);
    assert_eq!(code, 0);
    let (_, out, _) = run_cli(home.path(), &["apps", "list"]);
    assert_eq!(out.trim(), "firefox");
}

#[test]
fn test_apps_limit_enforced() {
    let home = tempfile::tempdir().unwrap();
    let apps: Vec<String> = (0..11).map(|i| format!("app{i}")).collect();
    let mut args = vec!["apps", "add"];
    args.extend(apps.iter().map(String::as_str));

    let (code, _, err) = run_cli(home.path(), &args);
    assert_eq!(code, 1);
    assert!(err.contains("error:"));
}

#[test]
fn test_limit_set_show_clear() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(run_cli(home.path(), &["limit", "set", "45"]).0, 0);
    let (_, out, _) = run_cli(home.path(), &["limit", "show"]);
    assert_eq!(out.trim(), "45");

    assert_eq!(run_cli(home.path(), &["limit", "set", "0"]).0, 1);
    assert_eq!(run_cli(home.path(), &["limit", "set", "5000"]).0, 1);

    assert_eq!(run_cli(home.path(), &["limit", "clear"]).0, 0);
    let (_, out, _) = run_cli(home.path(), &["limit", "show"]);
    assert_eq!(out.trim(), "0");
}

#[test]
fn test_reminders_set_and_get() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(run_cli(home.path(), &["reminders", "set", "firstLeadMinutes", "15"]).0, 0);
    let (_, out, _) = run_cli(home.path(), &["reminders", "get", "firstLeadMinutes"]);
    assert_eq!(out.trim(), "15");

    let (code, _, _) = run_cli(home.path(), &["reminders", "set", "secondLeadMinutes", "30"]);
    assert_eq!(code, 1);

    let (_, out, _) = run_cli(home.path(), &["reminders", "show"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["firstLeadMinutes"], 15);
    assert_eq!(json["secondLeadMinutes"], 5);
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let (_, out, _) = run_cli(home.path(), &["config", "get", "cadence.poll_secs"]);
    assert_eq!(out.trim(), "5");

    assert_eq!(run_cli(home.path(), &["config", "set", "limits.overlay_throttle_secs", "45"]).0, 0);
    let (_, out, _) = run_cli(home.path(), &["config", "get", "limits.overlay_throttle_secs"]);
    assert_eq!(out.trim(), "45");

    assert_eq!(run_cli(home.path(), &["config", "get", "nope"]).0, 1);
    assert!(home.path().join("config.toml").exists());
}

#[test]
fn test_status_json() {
    let home = tempfile::tempdir().unwrap();
    run_cli(home.path(), &["limit", "set", "30"]);
    {
        let db = open_db(home.path());
        kv::write_u64(&db, keys::COUNTER, 600).unwrap();
    }

    let (code, out, _) = run_cli(home.path(), &["status", "--json"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["limit_minutes"], 30);
    assert_eq!(json["counter_secs"], 600);
    assert_eq!(json["remaining_secs"], 1200);
    assert_eq!(json["stage"], "normal");
}

#[test]
fn test_reset_first_run_then_force() {
    let home = tempfile::tempdir().unwrap();
    {
        let db = open_db(home.path());
        kv::write_u64(&db, keys::COUNTER, 900).unwrap();
    }

    let (code, out, _) = run_cli(home.path(), &["reset"]);
    assert_eq!(code, 0);
    assert!(out.contains("baseline"));
    assert_eq!(kv::read_u64(&open_db(home.path()), keys::COUNTER).unwrap(), 900);

    let (_, out, _) = run_cli(home.path(), &["reset"]);
    assert!(out.contains("not due"));

    let (code, out, _) = run_cli(home.path(), &["reset", "--force"]);
    assert_eq!(code, 0);
    assert!(out.contains("usage reset"));
    assert_eq!(kv::read_u64(&open_db(home.path()), keys::COUNTER).unwrap(), 0);
}
