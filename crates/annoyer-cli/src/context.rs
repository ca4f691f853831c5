//! Configuration and history store shared by every command.

use annoyer_core::storage::HistoryStore;
use annoyer_core::{Config, EventHistory};

pub struct Context {
    pub config: Config,
    pub store: HistoryStore,
}

impl Context {
    /// Load the configuration (defaults on error) and locate the history file.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load_or_default();
        let store = match &config.history_file {
            Some(path) => HistoryStore::new(path),
            None => HistoryStore::open_default()?,
        };
        Ok(Self { config, store })
    }

    /// Read the history, printing a warning if the file had to be discarded.
    pub fn history(&self) -> EventHistory {
        let loaded = self.store.load(self.config.alarm.default_duration_secs);
        if let Some(warning) = loaded.warning {
            eprintln!("warning: {warning}");
        }
        loaded.history
    }
}
