use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmState, DurationChoice};
use crate::estimator::RateSource;

/// Every state change of the alarm produces an event.
/// Display layers poll snapshots; the CLI prints events as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlarmEvent {
    /// Probability reached the threshold; the sink was started.
    AlarmStarted {
        probability: f64,
        threshold: f64,
        duration_secs: f64,
        at: DateTime<Utc>,
    },
    /// The alarm was silenced.
    AlarmStopped {
        reason: StopReason,
        at: DateTime<Utc>,
    },
    /// A distraction was acknowledged and recorded.
    DistractionRecorded {
        choice: DurationChoice,
        /// True when the alarm was not ringing.
        early: bool,
        next_duration_secs: f64,
        event_count: usize,
        at: DateTime<Utc>,
    },
    ThresholdChanged {
        threshold: f64,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user acknowledged the alarm.
    Acknowledged,
    /// The threshold was raised above the current probability.
    BelowThreshold,
}

/// Point-in-time view of the model for display layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub state: AlarmState,
    pub probability: f64,
    pub threshold: f64,
    pub elapsed_secs: f64,
    /// Positive: not yet due. Zero or negative: already exceeded.
    pub time_to_threshold_secs: f64,
    pub mean_gap_secs: f64,
    pub rate: f64,
    pub rate_source: RateSource,
    pub event_count: usize,
    pub next_duration_secs: f64,
    pub last_event_at: DateTime<Utc>,
    pub at: DateTime<Utc>,
}
