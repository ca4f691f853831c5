//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Alarm threshold and sound
//! - Fallback rate and session-break filter for the model
//! - Tick cadence of the driver
//! - How the acknowledgement controls change the alarm duration
//!
//! Configuration is stored at `~/.config/annoyer/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::alarm::PolicyKind;
use crate::error::{ConfigError, ValidationError};
use crate::estimator::{DistractionEstimator, Threshold, DEFAULT_RATE};
use crate::history::DEFAULT_NEXT_DURATION_SECS;

/// Alarm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Sound played when the alarm rings (optional).
    #[serde(default)]
    pub sound_file: Option<PathBuf>,
    /// Playback volume, 0.0 to 1.0.
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default = "default_duration_secs")]
    pub default_duration_secs: f64,
}

/// Model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Rate per second used until there is a gap to fit.
    #[serde(default = "default_rate")]
    pub default_rate: f64,
    /// Gaps this long or longer are treated as time away. 0 disables.
    #[serde(default = "default_session_break_secs")]
    pub session_break_secs: f64,
}

/// Driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/annoyer/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Override for the history file location.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub duration_policy: PolicyKind,
}

// Default functions
fn default_threshold() -> f64 {
    0.667
}
fn default_volume() -> f64 {
    0.8
}

fn default_duration_secs() -> f64 {
    DEFAULT_NEXT_DURATION_SECS
}
fn default_rate() -> f64 {
    DEFAULT_RATE
}
fn default_session_break_secs() -> f64 {
    4.0 * 3600.0
}
fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            sound_file: None,
            volume: default_volume(),
            default_duration_secs: default_duration_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_rate: default_rate(),
            session_break_secs: default_session_break_secs(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_file: None,
            alarm: AlarmConfig::default(),
            model: ModelConfig::default(),
            driver: DriverConfig::default(),
            duration_policy: PolicyKind::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Optional fields serialize as null; clear them with an empty value.
                    _ if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data_dir>/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is
    /// invalid, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            log::warn!("{e}; using default configuration");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Check every value the model and driver depend on.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.threshold()?;
        self.estimator()?;
        if !(0.0..=1.0).contains(&self.alarm.volume) {
            return Err(ConfigError::InvalidValue {
                key: "alarm.volume".into(),
                message: format!("{} is not between 0 and 1", self.alarm.volume),
            });
        }
        let d = self.alarm.default_duration_secs;
        if !(d.is_finite() && d >= 0.0) {
            return Err(ValidationError::InvalidDuration { value: d }.into());
        }
        if !(self.model.session_break_secs.is_finite() && self.model.session_break_secs >= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "model.session_break_secs".into(),
                message: "must be finite and non-negative".into(),
            });
        }
        if self.driver.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "driver.tick_interval_ms".into(),
                message: "must be at least 1".into(),
            });
        }
        self.duration_policy.validate()?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and validate the result. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting configuration is invalid. `self` is left unchanged
    /// on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn threshold(&self) -> Result<Threshold, ValidationError> {
        Threshold::new(self.alarm.threshold)
    }

    pub fn estimator(&self) -> Result<DistractionEstimator, ValidationError> {
        let session_break = Some(self.model.session_break_secs);
        Ok(DistractionEstimator::new(self.model.default_rate)?.with_session_break(session_break))
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.driver.tick_interval_ms.max(1))
    }

    /// The configured sound file, if it exists and is a regular file.
    pub fn playable_sound(&self) -> Option<&Path> {
        let path = self.alarm.sound_file.as_deref()?;
        if path.is_file() {
            Some(path)
        } else {
            log::warn!("Alarm sound file is not playable: {}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.alarm.threshold, 0.667);
        assert_eq!(parsed.driver.tick_interval_ms, 100);
        assert_eq!(parsed.duration_policy, PolicyKind::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.model.default_rate, DEFAULT_RATE);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("alarm.threshold").as_deref(), Some("0.667"));
        assert_eq!(cfg.get("driver.tick_interval_ms").as_deref(), Some("100"));
        assert_eq!(cfg.get("duration_policy.kind").as_deref(), Some("multiplicative"));
        assert!(cfg.get("alarm.missing_key").is_none());
    }

    #[test]
    fn set_updates_threshold() {
        let mut cfg = Config::default();
        cfg.set("alarm.threshold", "0.8").unwrap();
        assert_eq!(cfg.alarm.threshold, 0.8);
    }

    #[test]
    fn set_rejects_threshold_at_bounds() {
        let mut cfg = Config::default();
        assert!(cfg.set("alarm.threshold", "1").is_err());
        assert!(cfg.set("alarm.threshold", "0").is_err());
        assert_eq!(cfg.alarm.threshold, 0.667);
    }

    #[test]
    fn set_optional_string_field() {
        let mut cfg = Config::default();
        cfg.set("alarm.sound_file", "/tmp/ring.wav").unwrap();
        assert_eq!(cfg.alarm.sound_file, Some(PathBuf::from("/tmp/ring.wav")));
        cfg.set("alarm.sound_file", "").unwrap();
        assert!(cfg.alarm.sound_file.is_none());
    }

    #[test]
    fn set_rejects_volume_out_of_range() {
        let mut cfg = Config::default();
        assert!(cfg.set("alarm.volume", "1.5").is_err());
        cfg.set("alarm.volume", "0.25").unwrap();
        assert_eq!(cfg.alarm.volume, 0.25);
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "alarm.nonexistent_key", "value");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_zero_cadence() {
        let mut cfg = Config::default();
        assert!(cfg.set("driver.tick_interval_ms", "0").is_err());
    }

    #[test]
    fn set_switches_policy_kind() {
        let mut cfg = Config::default();
        cfg.set(
            "duration_policy",
            r#"{"kind": "step", "step_secs": 5.0, "min_secs": 1.0, "max_secs": 60.0}"#,
        )
        .unwrap();
        assert!(matches!(cfg.duration_policy, PolicyKind::Step { .. }));
    }

    #[test]
    fn load_from_missing_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.alarm.threshold, 0.667);
        assert!(path.exists());
    }

    #[test]
    fn load_from_rejects_invalid_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[alarm]\nthreshold = 1.5\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn playable_sound_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.alarm.sound_file = Some(dir.path().join("missing.wav"));
        assert!(cfg.playable_sound().is_none());

        let wav = dir.path().join("ring.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        cfg.alarm.sound_file = Some(wav.clone());
        assert_eq!(cfg.playable_sound(), Some(wav.as_path()));
    }

    #[test]
    fn estimator_honours_session_break() {
        let mut cfg = Config::default();
        cfg.model.session_break_secs = 0.0;
        assert_eq!(cfg.estimator().unwrap().session_break_secs(), None);
        cfg.model.session_break_secs = 60.0;
        assert_eq!(cfg.estimator().unwrap().session_break_secs(), Some(60.0));
    }
}
