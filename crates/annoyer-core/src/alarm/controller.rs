//! Alarm state machine.
//!
//! The controller is wall-clock driven and has no internal thread. The
//! caller invokes `tick(now)` at a fixed cadence; user input arrives through
//! `acknowledge` and `set_threshold`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --tick, p >= threshold--> Ringing     (sink.start_alarm)
//! Ringing --tick, p < threshold--> Idle      (sink.stop_alarm)
//! Ringing --acknowledge--> Idle              (sink.stop_alarm)
//! ```
//!
//! Acknowledging always records an event and restarts the elapsed clock,
//! whatever the state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::{DurationChoice, DurationPolicy, PolicyKind};
use super::sink::AlarmSink;
use crate::error::ValidationError;
use crate::estimator::{self, DistractionEstimator, RateEstimate, RateSource, Threshold};
use crate::events::{AlarmEvent, ModelSnapshot, StopReason};
use crate::history::{seconds_between, EventHistory, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    /// Silent, probability below threshold.
    Idle,
    /// Sounding and not yet acknowledged.
    Ringing,
}

/// Owns the history, the threshold and the alarm state for one session.
pub struct AlarmController<S, P = PolicyKind> {
    estimator: DistractionEstimator,
    history: EventHistory,
    policy: P,
    sink: S,
    threshold: Threshold,
    state: AlarmState,
    /// Instant the current gap is timed from.
    last_event_time: DateTime<Utc>,
}

impl<S: AlarmSink, P: DurationPolicy> AlarmController<S, P> {
    /// Create a controller in the `Idle` state.
    ///
    /// `started_at` acts as an implicit first event: elapsed time is measured
    /// from it until the first acknowledgement, and the gap recorded by that
    /// acknowledgement starts there too.
    pub fn new(
        mut history: EventHistory,
        estimator: DistractionEstimator,
        policy: P,
        sink: S,
        threshold: Threshold,
        started_at: DateTime<Utc>,
    ) -> Self {
        let last_event_time = history.begin_session(started_at);
        Self {
            estimator,
            history,
            policy,
            sink,
            threshold,
            state: AlarmState::Idle,
            last_event_time,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn estimator(&self) -> &DistractionEstimator {
        &self.estimator
    }

    pub fn last_event_time(&self) -> DateTime<Utc> {
        self.last_event_time
    }

    /// Seconds since the last event, never negative.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        seconds_between(self.last_event_time, now).max(0.0)
    }

    /// Rate fitted to the current history. Recomputed on every call.
    pub fn rate(&self) -> RateEstimate {
        self.estimator.estimate(&self.history)
    }

    pub fn probability(&self, now: DateTime<Utc>) -> f64 {
        estimator::probability(self.elapsed_secs(now), self.rate().rate)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ModelSnapshot {
        let rate = self.rate();
        let elapsed = self.elapsed_secs(now);
        ModelSnapshot {
            state: self.state,
            probability: estimator::probability(elapsed, rate.rate),
            threshold: self.threshold.value(),
            elapsed_secs: elapsed,
            time_to_threshold_secs: estimator::time_to_threshold(self.threshold, rate.rate, elapsed),
            mean_gap_secs: rate.mean_gap_secs(),
            rate: rate.rate,
            rate_source: rate.source,
            event_count: self.history.len(),
            next_duration_secs: self.history.next_duration_secs(),
            last_event_at: self.last_event_time,
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Evaluate the model at `now` and fire or clear the alarm.
    ///
    /// Returns an event only when the state changed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<AlarmEvent> {
        let p = self.probability(now);
        let threshold = self.threshold.value();

        match self.state {
            AlarmState::Idle if p >= threshold => {
                let duration_secs = self.history.next_duration_secs();
                self.state = AlarmState::Ringing;
                self.sink.start_alarm(duration_secs);
                log::info!("Alarm started: p={p:.3} >= threshold {threshold:.3}");
                Some(AlarmEvent::AlarmStarted {
                    probability: p,
                    threshold,
                    duration_secs,
                    at: now,
                })
            }
            AlarmState::Ringing if p < threshold => {
                self.silence();
                log::info!("Alarm stopped: p={p:.3} fell below threshold {threshold:.3}");
                Some(AlarmEvent::AlarmStopped {
                    reason: StopReason::BelowThreshold,
                    at: now,
                })
            }
            AlarmState::Ringing => {
                self.sink.sustain();
                None
            }
            AlarmState::Idle => None,
        }
    }

    /// Record a distraction at `now`, silence the alarm if it is ringing and
    /// adjust the next alarm duration.
    ///
    /// A `now` earlier than the last event (clock skew) is clamped to it, so
    /// the recorded gap is zero rather than negative.
    pub fn acknowledge(&mut self, choice: DurationChoice, now: DateTime<Utc>) -> Vec<AlarmEvent> {
        let mut events = Vec::with_capacity(2);
        let early = self.state == AlarmState::Idle;
        let target_secs = Some(estimator::crossing_time(self.threshold, self.rate().rate))
            .filter(|t| t.is_finite());

        let at = if now < self.last_event_time {
            log::warn!(
                "Acknowledged at {now}, before the last event at {}; recording a zero-length gap",
                self.last_event_time
            );
            self.last_event_time
        } else {
            now
        };
        let outcome = Outcome {
            choice,
            early,
            target_secs,
        };
        let at = self.history.record_clamped(at, Some(outcome));
        self.last_event_time = at;
        let rate = self.rate();
        if rate.source == RateSource::Fallback {
            log::warn!("History gives no usable rate; using default rate {}", rate.rate);
        }

        if self.state == AlarmState::Ringing {
            self.silence();
            events.push(AlarmEvent::AlarmStopped {
                reason: StopReason::Acknowledged,
                at,
            });
        }

        let current = self.history.next_duration_secs();
        let next = self.policy.apply(current, choice);
        if next.is_finite() && next >= 0.0 {
            self.history.set_next_duration_secs(next);
        } else {
            log::warn!("Duration policy produced {next}s; keeping {current}s");
        }

        log::info!(
            "Distraction recorded ({choice}, {}), next alarm {:.1}s, {} events",
            if early { "early" } else { "alarmed" },
            self.history.next_duration_secs(),
            self.history.len()
        );
        events.push(AlarmEvent::DistractionRecorded {
            choice,
            early,
            next_duration_secs: self.history.next_duration_secs(),
            event_count: self.history.len(),
            at,
        });
        events
    }

    /// Replace the threshold. The alarm is re-evaluated on the next tick.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidThreshold`] if `p` is not in (0, 1);
    /// the previous threshold stays in force.
    pub fn set_threshold(&mut self, p: f64, now: DateTime<Utc>) -> Result<AlarmEvent, ValidationError> {
        self.threshold = Threshold::new(p)?;
        Ok(AlarmEvent::ThresholdChanged { threshold: p, at: now })
    }

    /// Stop the alarm if it is ringing. Used on shutdown.
    pub fn halt(&mut self) {
        if self.state == AlarmState::Ringing {
            self.silence();
        }
    }

    /// Consume the controller, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn silence(&mut self) {
        self.state = AlarmState::Idle;
        self.sink.stop_alarm();
    }
}
