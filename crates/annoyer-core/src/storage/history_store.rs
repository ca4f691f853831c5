//! JSON persistence for the event history.
//!
//! On-disk layout:
//!
//! ```json
//! {
//!   "events": [1700000000.0, 1700000012.5],
//!   "next_duration": 30.0,
//!   "outcomes": [null, {"choice": "keep", "early": false, "target_secs": 13.9}],
//!   "session_starts": [1700000005.0]
//! }
//! ```
//!
//! `events` are Unix timestamps in seconds (millisecond precision) and must
//! be non-decreasing. `next_duration` is the alarm length in seconds.
//! `outcomes` is optional and aligned with `events`. `session_starts` is
//! optional and lists the instants the application was opened.
//!
//! Loading never fails: a missing file is an empty history, and a file that
//! cannot be read or parsed is reported as a warning and treated as missing.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::PersistenceError;
use crate::history::{DistractionEvent, EventHistory, Outcome, DEFAULT_NEXT_DURATION_SECS};

const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    events: Vec<f64>,
    #[serde(default = "default_next_duration")]
    next_duration: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    outcomes: Vec<Option<Outcome>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    session_starts: Vec<f64>,
}

fn default_next_duration() -> f64 {
    DEFAULT_NEXT_DURATION_SECS
}

/// Result of a lenient load.
#[derive(Debug)]
pub struct Loaded {
    pub history: EventHistory,
    /// Set when the file existed but had to be discarded.
    pub warning: Option<PersistenceError>,
}

/// Reads and writes the history file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/history.json`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open_default() -> Result<Self, PersistenceError> {
        Ok(Self::new(data_dir()?.join(HISTORY_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, substituting an empty history with `default_duration_secs` for a
    /// missing or broken file.
    pub fn load(&self, default_duration_secs: f64) -> Loaded {
        match self.try_load() {
            Ok(Some(history)) => {
                log::info!(
                    "Read history {}: {} events",
                    self.path.display(),
                    history.len()
                );
                Loaded {
                    history,
                    warning: None,
                }
            }
            Ok(None) => {
                log::info!("History file not found, starting fresh: {}", self.path.display());
                Loaded {
                    history: EventHistory::with_next_duration(default_duration_secs),
                    warning: None,
                }
            }
            Err(err) => {
                log::warn!("{err}; starting with an empty history");
                Loaded {
                    history: EventHistory::with_next_duration(default_duration_secs),
                    warning: Some(err),
                }
            }
        }
    }

    /// Strict load. `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Returns [`PersistenceError::Read`] or [`PersistenceError::Malformed`].
    pub fn try_load(&self) -> Result<Option<EventHistory>, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        from_json(&content)
            .map(Some)
            .map_err(|message| PersistenceError::Malformed {
                path: self.path.clone(),
                message,
            })
    }

    /// Write the history, replacing the file atomically.
    ///
    /// # Errors
    /// Returns [`PersistenceError::Write`] if the file cannot be written.
    pub fn save(&self, history: &EventHistory) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };
        let content = to_json(history).map_err(|e| write_err(std::io::Error::other(e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        log::debug!("Wrote history {}: {} events", self.path.display(), history.len());
        Ok(())
    }
}

/// Serialize a history to the on-disk JSON layout.
pub fn to_json(history: &EventHistory) -> serde_json::Result<String> {
    let events = history.events();
    let outcomes = if events.iter().any(|e| e.outcome.is_some()) {
        events.iter().map(|e| e.outcome).collect()
    } else {
        Vec::new()
    };
    let file = HistoryFile {
        events: events.iter().map(|e| secs_from_timestamp(e.at)).collect(),
        next_duration: history.next_duration_secs(),
        outcomes,
        session_starts: history
            .session_starts()
            .iter()
            .map(|s| secs_from_timestamp(*s))
            .collect(),
    };
    serde_json::to_string_pretty(&file)
}

/// Parse the on-disk JSON layout.
///
/// Misaligned `outcomes` are dropped; the events are kept.
///
/// # Errors
/// Returns a description of the problem for invalid JSON, timestamps that
/// are not representable, or timestamps out of order.
pub fn from_json(content: &str) -> Result<EventHistory, String> {
    let file: HistoryFile = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut outcomes = file.outcomes;
    if !outcomes.is_empty() && outcomes.len() != file.events.len() {
        log::warn!(
            "History has {} outcomes for {} events; ignoring outcomes",
            outcomes.len(),
            file.events.len()
        );
        outcomes.clear();
    }
    outcomes.resize(file.events.len(), None);

    let events = file
        .events
        .iter()
        .zip(outcomes)
        .enumerate()
        .map(|(i, (&secs, outcome))| {
            timestamp_from_secs(secs)
                .map(|at| DistractionEvent { at, outcome })
                .ok_or_else(|| format!("event {i}: invalid timestamp {secs}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !(file.next_duration.is_finite() && file.next_duration >= 0.0) {
        log::warn!(
            "Invalid next_duration {}; using {DEFAULT_NEXT_DURATION_SECS}s",
            file.next_duration
        );
    }

    let session_starts = file
        .session_starts
        .iter()
        .filter_map(|&secs| timestamp_from_secs(secs))
        .collect();

    EventHistory::from_events(events, file.next_duration)
        .map(|history| history.with_session_starts(session_starts))
        .map_err(|e| e.to_string())
}

fn secs_from_timestamp(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::DurationChoice;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn save_then_load_reproduces_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        let mut history = EventHistory::new();
        history.append(t(0)).unwrap();
        history
            .record(
                t(42),
                Outcome {
                    choice: DurationChoice::Decrease,
                    early: true,
                    target_secs: Some(21.5),
                },
            )
            .unwrap();
        history.set_next_duration_secs(12.5);
        store.save(&history).unwrap();

        let loaded = store.load(DEFAULT_NEXT_DURATION_SECS);
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.history, history);
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nope.json"));
        let loaded = store.load(DEFAULT_NEXT_DURATION_SECS);
        assert!(loaded.history.is_empty());
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.history.next_duration_secs(), DEFAULT_NEXT_DURATION_SECS);
    }

    #[test]
    fn malformed_file_is_empty_history_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ this is not json").unwrap();
        let loaded = HistoryStore::new(&path).load(7.0);
        assert!(loaded.history.is_empty());
        assert_eq!(loaded.history.next_duration_secs(), 7.0);
        assert!(matches!(
            loaded.warning,
            Some(PersistenceError::Malformed { .. })
        ));
    }

    #[test]
    fn unordered_events_are_malformed() {
        let err = from_json(r#"{"events": [20.0, 10.0], "next_duration": 5}"#).unwrap_err();
        assert!(err.contains("precedes"));
    }

    #[test]
    fn minimal_schema_parses() {
        let history = from_json(r#"{"events": [1700000000, 1700000010.5], "next_duration": 20}"#).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.gaps(), vec![10.5]);
        assert_eq!(history.next_duration_secs(), 20.0);
        assert!(history.events().iter().all(|e| e.outcome.is_none()));
    }

    #[test]
    fn missing_duration_uses_default() {
        let history = from_json(r#"{"events": []}"#).unwrap();
        assert_eq!(history.next_duration_secs(), DEFAULT_NEXT_DURATION_SECS);
    }

    #[test]
    fn misaligned_outcomes_are_dropped() {
        let history = from_json(
            r#"{"events": [1, 2], "next_duration": 5, "outcomes": [{"choice": "keep", "early": true}]}"#,
        )
        .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.events().iter().all(|e| e.outcome.is_none()));
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("history.json"));
        store.save(&EventHistory::new()).unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn to_json_omits_outcomes_when_none_recorded() {
        let mut history = EventHistory::new();
        history.append(t(0)).unwrap();
        let json = to_json(&history).unwrap();
        assert!(!json.contains("outcomes"));
        assert!(json.contains("\"next_duration\""));
    }

    #[test]
    fn save_then_load_reproduces_live_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        let mut history = EventHistory::new();
        history.append(Utc::now()).unwrap();
        history.begin_session(Utc::now() + chrono::Duration::nanoseconds(1_500_001));
        history.record_clamped(Utc::now() + chrono::Duration::seconds(3), None);
        store.save(&history).unwrap();

        let loaded = store.try_load().unwrap().unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.gaps(), history.gaps());
    }

    #[test]
    fn session_starts_survive_round_trip() {
        let mut history = EventHistory::new();
        history.append(t(0)).unwrap();
        history.begin_session(t(3600));
        history.append(t(3610)).unwrap();
        let json = to_json(&history).unwrap();
        assert!(json.contains("session_starts"));

        let loaded = from_json(&json).unwrap();
        assert_eq!(loaded.session_starts(), &[t(3600)]);
        assert_eq!(loaded.gaps(), vec![10.0]);
    }
}
