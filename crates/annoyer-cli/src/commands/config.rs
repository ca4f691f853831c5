use clap::Subcommand;
use annoyer_core::{Config, Threshold};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "alarm.threshold", "driver.tick_interval_ms")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value (empty to clear an optional value)
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

/// Write `value` as the saved threshold. Every other setting stays as it is
/// on disk, including ones overridden for the current session.
pub fn save_threshold(value: f64) -> Result<f64, Box<dyn std::error::Error>> {
    let threshold = Threshold::new(value)?;
    let mut config = Config::load()?;
    config.alarm.threshold = threshold.value();
    config.save()?;
    Ok(threshold.value())
}

pub fn set_threshold(value: f64) -> Result<(), Box<dyn std::error::Error>> {
    let saved = save_threshold(value)?;
    println!("threshold set to {saved}");
    Ok(())
}
