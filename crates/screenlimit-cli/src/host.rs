//! Terminal host: platform capabilities backed by shell commands, the
//! shared database and stderr.

use std::collections::BTreeSet;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use screenlimit_core::platform::fake::FakeBlocker;
use screenlimit_core::platform::{AppBlocker, ForegroundProbe, Notifier, OverlaySurface};
use screenlimit_core::storage::kv::{self, keys};
use screenlimit_core::{Config, Database, Host, Permission, PlatformError};

/// Assemble the host for this process. `dry_run` swaps the block list for
/// an in-memory one so nothing is actually blocked.
pub fn build(config: &Config, dry_run: bool) -> Result<Host, Box<dyn std::error::Error>> {
    let probe = CommandProbe::new(
        config.host.foreground_command.clone(),
        Duration::from_millis(config.host.probe_timeout_ms),
    );
    let blocker: Box<dyn AppBlocker> = if dry_run {
        Box::new(FakeBlocker::new())
    } else {
        Box::new(StoreBlocker {
            db: Database::open()?,
        })
    };

    Ok(Host::new(
        Box::new(Database::open()?),
        Box::new(probe),
        blocker,
        Box::new(TerminalNotifier),
    )
    .with_overlay(Box::new(TerminalOverlay)))
}

/// Runs a command that prints the foreground application's identifier.
pub struct CommandProbe {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandProbe {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

impl ForegroundProbe for CommandProbe {
    fn foreground_app(&self) -> Option<String> {
        let (program, args) = self.command.split_first()?;
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(program = %program, error = %e, "foreground probe failed to start");
                return None;
            }
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => break,
                Ok(Some(_)) => return None,
                Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(10)),
                Ok(None) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::debug!(program = %program, "foreground probe timed out");
                    return None;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "foreground probe wait failed");
                    return None;
                }
            }
        }

        let mut out = String::new();
        child.stdout.take()?.read_to_string(&mut out).ok()?;
        let app = out.trim();
        (!app.is_empty()).then(|| app.to_string())
    }
}

/// Publishes the block list under `blockedApps` for a companion launcher
/// or shell hook to honour.
pub struct StoreBlocker {
    db: Database,
}

impl AppBlocker for StoreBlocker {
    fn set_blocked_apps(&self, apps: &BTreeSet<String>) -> Result<(), PlatformError> {
        kv::write_json(&self.db, keys::BLOCKED_APPS, apps)
            .map_err(|e| PlatformError::failed("set_blocked_apps", e.to_string()))
    }

    fn bring_host_to_foreground(&self) -> Result<(), PlatformError> {
        eprintln!("\x07screenlimit: today's limit is used up, this app is blocked");
        Ok(())
    }
}

/// Notifications as lines on stderr. A terminal never needs permission.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn permission_status(&self) -> Permission {
        Permission::Authorized
    }

    fn request_permission(&self) -> Permission {
        Permission::Authorized
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), PlatformError> {
        eprintln!("[{title}] {body}");
        Ok(())
    }

    fn vibrate(&self, _pattern: &[u64]) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable {
            capability: "vibrate",
        })
    }

    fn play_sound(&self) -> Result<(), PlatformError> {
        eprint!("\x07");
        Ok(())
    }
}

pub struct TerminalOverlay;

impl OverlaySurface for TerminalOverlay {
    fn show_reminder_overlay(&self, remaining_minutes: u64) -> Result<(), PlatformError> {
        eprintln!("==== {remaining_minutes} min of screen time left ====");
        Ok(())
    }

    fn show_block_overlay(&self, app: &str) -> Result<(), PlatformError> {
        eprintln!("==== {app} is blocked until tomorrow ====");
        Ok(())
    }
}
