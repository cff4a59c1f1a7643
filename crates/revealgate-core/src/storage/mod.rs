mod config;

pub use config::RevealConfig;

use std::path::PathBuf;

use crate::error::Result;

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "REVEALGATE_CONFIG_DIR";

/// Returns `$REVEALGATE_CONFIG_DIR` if set, otherwise `~/.config/revealgate/`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn config_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("revealgate"),
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
