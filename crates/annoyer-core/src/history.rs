//! Ordered log of distraction events.
//!
//! The history is append-only during a session. Insertion order is
//! chronological order: every appended timestamp must be at or after the
//! previous one. Alongside the events it carries the alarm duration the user
//! last chose, which is persisted with the events but plays no part in the
//! statistical model.
//!
//! Session starts are kept as boundaries: a gap that spans a restart is timed
//! from the restart, not from the event before it, so time the application
//! was closed never counts as focus time. Timestamps are held at millisecond
//! resolution, the resolution they are persisted at.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::DurationChoice;
use crate::error::HistoryError;

/// Alarm duration used when nothing has been persisted yet, in seconds.
pub const DEFAULT_NEXT_DURATION_SECS: f64 = 30.0;

/// How an event was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Which control the user pressed.
    pub choice: DurationChoice,
    /// True when the alarm was not ringing at the time.
    pub early: bool,
    /// Gap after which the alarm was due, as the model stood at the time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_secs: Option<f64>,
}

/// A single recorded distraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistractionEvent {
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub increase: usize,
    pub decrease: usize,
    pub keep: usize,
    /// Acknowledged before the alarm rang.
    pub early: usize,
    /// Acknowledged while the alarm was ringing.
    pub alarmed: usize,
    /// Events without a recorded outcome.
    pub unrecorded: usize,
}

/// Actual gaps against the gaps the model predicted for them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub count: usize,
    pub mean_actual_secs: f64,
    pub mean_target_secs: f64,
}

/// Chronological event log plus the persisted alarm duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHistory {
    events: Vec<DistractionEvent>,
    next_duration_secs: f64,
    /// Sorted. At most one boundary lies between two successive events.
    #[serde(default)]
    session_starts: Vec<DateTime<Utc>>,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHistory {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_duration_secs: DEFAULT_NEXT_DURATION_SECS,
            session_starts: Vec::new(),
        }
    }

    /// Empty history with the given alarm duration.
    pub fn with_next_duration(secs: f64) -> Self {
        let mut history = Self::new();
        history.set_next_duration_secs(secs);
        history
    }

    /// Build a history from already-recorded events.
    ///
    /// # Errors
    /// Returns [`HistoryError::OutOfOrder`] at the first event that precedes
    /// its predecessor.
    pub fn from_events(
        events: Vec<DistractionEvent>,
        next_duration_secs: f64,
    ) -> Result<Self, HistoryError> {
        if let Some(pair) = events.windows(2).find(|w| w[1].at < w[0].at) {
            return Err(HistoryError::OutOfOrder {
                previous: pair[0].at,
                attempted: pair[1].at,
            });
        }
        Ok(Self {
            events,
            next_duration_secs: sanitize_duration(next_duration_secs),
            session_starts: Vec::new(),
        })
    }

    /// Attach previously recorded session starts.
    pub fn with_session_starts(mut self, mut starts: Vec<DateTime<Utc>>) -> Self {
        starts.sort();
        starts.dedup();
        self.session_starts = starts;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[DistractionEvent] {
        &self.events
    }

    /// Event timestamps in order, for graphing.
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.events.iter().map(|e| e.at)
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.at)
    }

    pub fn next_duration_secs(&self) -> f64 {
        self.next_duration_secs
    }

    pub fn session_starts(&self) -> &[DateTime<Utc>] {
        &self.session_starts
    }

    /// Successive inter-event durations in seconds.
    ///
    /// Length is `len() - 1`, empty with fewer than two events. A gap that
    /// spans a session start is measured from that start.
    pub fn gaps(&self) -> Vec<f64> {
        (1..self.events.len()).map(|i| self.gap_before(i)).collect()
    }

    /// Tally of how events were acknowledged.
    pub fn outcome_summary(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for event in &self.events {
            let Some(outcome) = event.outcome else {
                summary.unrecorded += 1;
                continue;
            };
            match outcome.choice {
                DurationChoice::Increase => summary.increase += 1,
                DurationChoice::Decrease => summary.decrease += 1,
                DurationChoice::Keep => summary.keep += 1,
            }
            if outcome.early {
                summary.early += 1;
            } else {
                summary.alarmed += 1;
            }
        }
        summary
    }

    /// Mean actual gap against mean predicted gap, over events that carry a
    /// prediction. `None` if there are none.
    pub fn target_summary(&self) -> Option<TargetSummary> {
        let pairs: Vec<(f64, f64)> = (1..self.events.len())
            .filter_map(|i| {
                let target = self.events[i].outcome?.target_secs?;
                Some((self.gap_before(i), target))
            })
            .collect();
        if pairs.is_empty() {
            return None;
        }
        let n = pairs.len() as f64;
        Some(TargetSummary {
            count: pairs.len(),
            mean_actual_secs: pairs.iter().map(|p| p.0).sum::<f64>() / n,
            mean_target_secs: pairs.iter().map(|p| p.1).sum::<f64>() / n,
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Append an event without an outcome.
    ///
    /// # Errors
    /// Returns [`HistoryError::OutOfOrder`] if `at` precedes the last event.
    pub fn append(&mut self, at: DateTime<Utc>) -> Result<(), HistoryError> {
        self.push(DistractionEvent { at, outcome: None })
    }

    /// Append an event with the control the user pressed.
    pub fn record(&mut self, at: DateTime<Utc>, outcome: Outcome) -> Result<(), HistoryError> {
        self.push(DistractionEvent {
            at,
            outcome: Some(outcome),
        })
    }

    /// Append at `at`, or at the last event's timestamp if `at` is earlier.
    ///
    /// Returns the timestamp actually recorded.
    pub fn record_clamped(&mut self, at: DateTime<Utc>, outcome: Option<Outcome>) -> DateTime<Utc> {
        let at = match self.last() {
            Some(last) if at < last => last,
            _ => at.trunc_subsecs(3),
        };
        self.events.push(DistractionEvent { at, outcome });
        at
    }

    /// Mark `at` as the start of a new observation period.
    ///
    /// The gap ending at the next event is timed from here. Ignored when the
    /// history is empty or `at` is not after the last event. A start with no
    /// event after it is replaced.
    ///
    /// Returns the instant the next gap is timed from.
    pub fn begin_session(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        let at = at.trunc_subsecs(3);
        let Some(last) = self.last() else {
            return at;
        };
        if at <= last {
            return last;
        }
        if self.session_starts.last().is_some_and(|s| *s > last) {
            self.session_starts.pop();
        }
        self.session_starts.push(at);
        at
    }

    pub fn set_next_duration_secs(&mut self, secs: f64) {
        self.next_duration_secs = sanitize_duration(secs);
    }

    /// Drop every event and session start. The alarm duration is kept.
    pub fn clear(&mut self) {
        self.events.clear();
        self.session_starts.clear();
    }

    fn push(&mut self, mut event: DistractionEvent) -> Result<(), HistoryError> {
        event.at = event.at.trunc_subsecs(3);
        if let Some(previous) = self.last() {
            if event.at < previous {
                return Err(HistoryError::OutOfOrder {
                    previous,
                    attempted: event.at,
                });
            }
        }
        self.events.push(event);
        Ok(())
    }

    /// Gap ending at event `i`, for `i >= 1`.
    fn gap_before(&self, i: usize) -> f64 {
        let (previous, at) = (self.events[i - 1].at, self.events[i].at);
        let idx = self.session_starts.partition_point(|s| *s <= at);
        let start = idx
            .checked_sub(1)
            .map(|j| self.session_starts[j])
            .filter(|s| *s >= previous)
            .unwrap_or(previous);
        seconds_between(start, at)
    }
}

/// Signed seconds from `from` to `to`, millisecond resolution.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

fn sanitize_duration(secs: f64) -> f64 {
    if secs.is_finite() && secs >= 0.0 {
        secs
    } else {
        DEFAULT_NEXT_DURATION_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn gaps_are_successive_differences() {
        let mut history = EventHistory::new();
        for s in [0, 10, 30, 60] {
            history.append(t(s)).unwrap();
        }
        assert_eq!(history.gaps(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn gaps_empty_with_fewer_than_two_events() {
        let mut history = EventHistory::new();
        assert!(history.gaps().is_empty());
        history.append(t(0)).unwrap();
        assert!(history.gaps().is_empty());
    }

    #[test]
    fn append_rejects_out_of_order() {
        let mut history = EventHistory::new();
        history.append(t(10)).unwrap();
        let err = history.append(t(5)).unwrap_err();
        assert_eq!(
            err,
            HistoryError::OutOfOrder {
                previous: t(10),
                attempted: t(5)
            }
        );
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn append_accepts_equal_timestamps() {
        let mut history = EventHistory::new();
        history.append(t(10)).unwrap();
        history.append(t(10)).unwrap();
        assert_eq!(history.gaps(), vec![0.0]);
    }

    #[test]
    fn record_clamped_never_goes_backwards() {
        let mut history = EventHistory::new();
        history.append(t(100)).unwrap();
        let recorded = history.record_clamped(t(90), None);
        assert_eq!(recorded, t(100));
        let recorded = history.record_clamped(t(120), None);
        assert_eq!(recorded, t(120));
        assert_eq!(history.gaps(), vec![0.0, 20.0]);
    }

    #[test]
    fn from_events_validates_order() {
        let events = vec![
            DistractionEvent { at: t(5), outcome: None },
            DistractionEvent { at: t(1), outcome: None },
        ];
        assert!(EventHistory::from_events(events, 10.0).is_err());
    }

    #[test]
    fn invalid_duration_falls_back_to_default() {
        let mut history = EventHistory::new();
        history.set_next_duration_secs(-3.0);
        assert_eq!(history.next_duration_secs(), DEFAULT_NEXT_DURATION_SECS);
        history.set_next_duration_secs(f64::NAN);
        assert_eq!(history.next_duration_secs(), DEFAULT_NEXT_DURATION_SECS);
        history.set_next_duration_secs(45.0);
        assert_eq!(history.next_duration_secs(), 45.0);
    }

    #[test]
    fn clear_keeps_duration() {
        let mut history = EventHistory::new();
        history.set_next_duration_secs(12.0);
        history.append(t(0)).unwrap();
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.next_duration_secs(), 12.0);
    }

    #[test]
    fn outcome_summary_counts_choices() {
        let mut history = EventHistory::new();
        history.append(t(0)).unwrap();
        let early_keep = Outcome {
            choice: DurationChoice::Keep,
            early: true,
            target_secs: None,
        };
        let alarmed_increase = Outcome {
            choice: DurationChoice::Increase,
            early: false,
            target_secs: None,
        };
        history.record(t(10), early_keep).unwrap();
        history.record(t(20), alarmed_increase).unwrap();
        history.record(t(30), alarmed_increase).unwrap();

        let summary = history.outcome_summary();
        assert_eq!(summary.unrecorded, 1);
        assert_eq!(summary.keep, 1);
        assert_eq!(summary.increase, 2);
        assert_eq!(summary.decrease, 0);
        assert_eq!(summary.early, 1);
        assert_eq!(summary.alarmed, 2);
    }

    #[test]
    fn seconds_between_is_signed() {
        let a = t(0);
        let b = a + Duration::milliseconds(1500);
        assert_eq!(seconds_between(a, b), 1.5);
        assert_eq!(seconds_between(b, a), -1.5);
    }

    #[test]
    fn gap_spanning_restart_is_timed_from_session_start() {
        let mut history = EventHistory::new();
        for s in [0, 10, 30, 60] {
            history.append(t(s)).unwrap();
        }
        // Reopened two hours later, distracted ten seconds in.
        let start = history.begin_session(t(60 + 7200));
        assert_eq!(start, t(7260));
        history.append(t(7270)).unwrap();
        assert_eq!(history.gaps(), vec![10.0, 20.0, 30.0, 10.0]);
        // Later gaps in the same session are event to event.
        history.append(t(7290)).unwrap();
        assert_eq!(history.gaps().last(), Some(&20.0));
    }

    #[test]
    fn unused_session_start_is_replaced() {
        let mut history = EventHistory::new();
        history.append(t(0)).unwrap();
        history.begin_session(t(100));
        history.begin_session(t(500));
        assert_eq!(history.session_starts(), &[t(500)]);
        history.append(t(530)).unwrap();
        assert_eq!(history.gaps(), vec![30.0]);
    }

    #[test]
    fn session_start_before_last_event_is_ignored() {
        let mut history = EventHistory::new();
        assert_eq!(history.begin_session(t(5)), t(5));
        assert!(history.session_starts().is_empty());
        history.append(t(10)).unwrap();
        assert_eq!(history.begin_session(t(10)), t(10));
        assert_eq!(history.begin_session(t(3)), t(10));
        assert!(history.session_starts().is_empty());
    }

    #[test]
    fn recorded_timestamps_are_truncated_to_millis() {
        let mut history = EventHistory::new();
        let at = t(0) + Duration::nanoseconds(1_234_567_891);
        history.append(at).unwrap();
        assert_eq!(history.last(), Some(t(0) + Duration::milliseconds(1234)));
        let clamped = history.record_clamped(at + Duration::nanoseconds(999_999), None);
        assert_eq!(clamped, t(0) + Duration::milliseconds(1235));
    }

    #[test]
    fn target_summary_compares_actual_and_predicted_gaps() {
        let mut history = EventHistory::new();
        assert!(history.target_summary().is_none());
        history.append(t(0)).unwrap();
        for (s, target) in [(10, 20.0), (40, 40.0)] {
            let outcome = Outcome {
                choice: DurationChoice::Keep,
                early: true,
                target_secs: Some(target),
            };
            history.record(t(s), outcome).unwrap();
        }
        let summary = history.target_summary().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean_actual_secs, 20.0);
        assert_eq!(summary.mean_target_secs, 30.0);
    }
}
