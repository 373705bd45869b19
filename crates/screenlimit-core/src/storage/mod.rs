pub(crate) mod config;
pub mod database;
pub mod kv;

pub use config::{CadenceConfig, Config, HostConfig, LimitsConfig, UsageSource};
pub use database::Database;
pub use kv::{keys, KvStore, MemoryStore};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `SCREENLIMIT_HOME` wins when set. Otherwise `~/.config/screenlimit[-dev]/`,
/// with `SCREENLIMIT_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("SCREENLIMIT_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("SCREENLIMIT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("screenlimit-dev")
            } else {
                base_dir.join("screenlimit")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
