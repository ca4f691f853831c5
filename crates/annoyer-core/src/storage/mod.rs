mod config;
pub mod history_store;

pub use config::{AlarmConfig, Config, DriverConfig, ModelConfig};
pub use history_store::{HistoryStore, Loaded};

use std::path::PathBuf;

use crate::error::PersistenceError;

/// Returns `~/.config/annoyer[-dev]/` based on ANNOYER_ENV.
///
/// Set ANNOYER_ENV=dev to use development data directory.
/// ANNOYER_DATA_DIR, when set, replaces the directory entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, PersistenceError> {
    let dir = match std::env::var_os("ANNOYER_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("ANNOYER_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("annoyer-dev")
            } else {
                base_dir.join("annoyer")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| PersistenceError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
