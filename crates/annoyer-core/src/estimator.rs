//! Exponential waiting-time model of distraction.
//!
//! Inter-event gaps are treated as draws from an exponential distribution
//! with rate λ, fitted as the reciprocal of the sample mean gap. Given the
//! time elapsed since the last event, the probability that a distraction is
//! already due is the exponential CDF:
//!
//! ```text
//! P(t) = 1 - e^(-λt)
//! ```
//!
//! and the time at which P reaches a target p* is `-ln(1 - p*) / λ`.
//!
//! The free functions are pure. [`DistractionEstimator`] carries the
//! fallback rate and the session-break filter, and never hands out a rate
//! that is not strictly positive and finite.

use serde::{Deserialize, Serialize};

use crate::error::{RateError, ValidationError};
use crate::history::EventHistory;

/// Rate used when there is nothing to fit: one distraction per ten minutes.
pub const DEFAULT_RATE: f64 = 1.0 / 600.0;

/// Largest probability ever reported. `1 - e^(-x)` rounds to exactly 1.0 for
/// large `x`; the model never reaches certainty.
pub const MAX_PROBABILITY: f64 = 1.0 - f64::EPSILON;

/// Alarm threshold, guaranteed to lie in the open interval (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    /// # Errors
    /// Returns [`ValidationError::InvalidThreshold`] for 0, 1, anything
    /// outside that range, or NaN.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidThreshold { value })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> Self {
        t.0
    }
}

/// Where a rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Fitted from at least one historical gap.
    Fitted,
    /// No usable gaps; the configured default.
    Default,
    /// The fit was degenerate; the configured default.
    Fallback,
}

/// A rate together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    pub rate: f64,
    pub source: RateSource,
}

impl RateEstimate {
    pub fn mean_gap_secs(&self) -> f64 {
        mean_gap(self.rate)
    }
}

/// Probability that a distraction is due after `elapsed_secs`.
///
/// Non-decreasing in `elapsed_secs`, 0 at or before 0, and always below 1.
pub fn probability(elapsed_secs: f64, rate: f64) -> f64 {
    if elapsed_secs <= 0.0 || rate <= 0.0 || !rate.is_finite() || elapsed_secs.is_nan() {
        return 0.0;
    }
    let p = -(-rate * elapsed_secs).exp_m1();
    p.clamp(0.0, MAX_PROBABILITY)
}

/// Seconds until the probability reaches `target`, given `elapsed_secs`
/// already accrued.
///
/// Positive means not yet due; zero or negative means the threshold has
/// already been crossed. Not clamped.
pub fn time_to_threshold(target: Threshold, rate: f64, elapsed_secs: f64) -> f64 {
    crossing_time(target, rate) - elapsed_secs
}

/// Elapsed time at which the probability equals `target`.
pub fn crossing_time(target: Threshold, rate: f64) -> f64 {
    -(-target.value()).ln_1p() / rate
}

/// Mean inter-event gap implied by `rate`, in seconds.
pub fn mean_gap(rate: f64) -> f64 {
    1.0 / rate
}

/// Fit λ as the reciprocal of the mean gap.
///
/// Returns `Ok(None)` when there are no gaps.
///
/// # Errors
/// Returns [`RateError::Degenerate`] when the result is not strictly positive
/// and finite, e.g. every gap is zero.
pub fn fit_rate(gaps: &[f64]) -> Result<Option<f64>, RateError> {
    if gaps.is_empty() {
        return Ok(None);
    }
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let rate = 1.0 / mean;
    if rate > 0.0 && rate.is_finite() {
        Ok(Some(rate))
    } else {
        Err(RateError::Degenerate {
            rate,
            mean_gap_secs: mean,
        })
    }
}

/// Fits the model to a history and answers point-in-time queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistractionEstimator {
    default_rate: f64,
    session_break_secs: Option<f64>,
}

impl Default for DistractionEstimator {
    fn default() -> Self {
        Self {
            default_rate: DEFAULT_RATE,
            session_break_secs: None,
        }
    }
}

impl DistractionEstimator {
    /// # Errors
    /// Returns [`ValidationError::InvalidValue`] unless `default_rate` is
    /// strictly positive and finite.
    pub fn new(default_rate: f64) -> Result<Self, ValidationError> {
        if !(default_rate > 0.0 && default_rate.is_finite()) {
            return Err(ValidationError::InvalidValue {
                field: "model.default_rate".into(),
                message: format!("{default_rate} is not a positive finite rate"),
            });
        }
        Ok(Self {
            default_rate,
            session_break_secs: None,
        })
    }

    /// Exclude gaps at or above `secs` from the fit. They span the time the
    /// application was closed, not time spent focused.
    pub fn with_session_break(mut self, secs: Option<f64>) -> Self {
        self.session_break_secs = secs.filter(|s| *s > 0.0 && s.is_finite());
        self
    }

    pub fn default_rate(&self) -> f64 {
        self.default_rate
    }

    pub fn session_break_secs(&self) -> Option<f64> {
        self.session_break_secs
    }

    /// Gaps of `history` that take part in the fit.
    pub fn usable_gaps(&self, history: &EventHistory) -> Vec<f64> {
        let gaps = history.gaps();
        match self.session_break_secs {
            Some(limit) => gaps.into_iter().filter(|g| *g < limit).collect(),
            None => gaps,
        }
    }

    /// Current rate with provenance. Never fails.
    pub fn estimate(&self, history: &EventHistory) -> RateEstimate {
        match fit_rate(&self.usable_gaps(history)) {
            Ok(Some(rate)) => RateEstimate {
                rate,
                source: RateSource::Fitted,
            },
            Ok(None) => RateEstimate {
                rate: self.default_rate,
                source: RateSource::Default,
            },
            Err(err) => {
                log::debug!("{err}; using default rate {}", self.default_rate);
                RateEstimate {
                    rate: self.default_rate,
                    source: RateSource::Fallback,
                }
            }
        }
    }

    /// λ for `history`, always strictly positive and finite.
    pub fn estimate_rate(&self, history: &EventHistory) -> f64 {
        self.estimate(history).rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn history_at(offsets: &[i64]) -> EventHistory {
        let mut history = EventHistory::new();
        for s in offsets {
            history
                .append(Utc.timestamp_opt(1_700_000_000 + s, 0).unwrap())
                .unwrap();
        }
        history
    }

    #[test]
    fn threshold_rejects_bounds() {
        assert!(Threshold::new(0.0).is_err());
        assert!(Threshold::new(1.0).is_err());
        assert!(Threshold::new(-0.2).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert_eq!(Threshold::new(0.5).unwrap().value(), 0.5);
    }

    #[test]
    fn threshold_deserialization_validates() {
        assert!(serde_json::from_str::<Threshold>("0.25").is_ok());
        assert!(serde_json::from_str::<Threshold>("1.0").is_err());
    }

    #[test]
    fn probability_at_zero_is_zero() {
        assert_eq!(probability(0.0, 0.05), 0.0);
        assert_eq!(probability(-5.0, 0.05), 0.0);
    }

    #[test]
    fn probability_never_reaches_one() {
        let p = probability(1e9, 1.0);
        assert!(p < 1.0);
        assert_eq!(p, MAX_PROBABILITY);
    }

    #[test]
    fn rate_from_gaps_10_20_30() {
        let history = history_at(&[0, 10, 30, 60]);
        let estimate = DistractionEstimator::default().estimate(&history);
        assert_eq!(estimate.source, RateSource::Fitted);
        assert!((estimate.rate - 0.05).abs() < 1e-12);
        assert!((estimate.mean_gap_secs() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn rate_defaults_with_zero_or_one_event() {
        let estimator = DistractionEstimator::new(0.01).unwrap();
        for history in [history_at(&[]), history_at(&[0])] {
            let estimate = estimator.estimate(&history);
            assert_eq!(estimate.rate, 0.01);
            assert_eq!(estimate.source, RateSource::Default);
        }
    }

    #[test]
    fn degenerate_rate_falls_back() {
        let history = history_at(&[5, 5, 5]);
        let estimate = DistractionEstimator::new(0.02).unwrap().estimate(&history);
        assert_eq!(estimate.rate, 0.02);
        assert_eq!(estimate.source, RateSource::Fallback);
    }

    #[test]
    fn fit_rate_reports_degenerate() {
        assert!(matches!(
            fit_rate(&[0.0, 0.0]),
            Err(RateError::Degenerate { .. })
        ));
        assert!(matches!(
            fit_rate(&[-10.0, 5.0]),
            Err(RateError::Degenerate { .. })
        ));
        assert_eq!(fit_rate(&[]), Ok(None));
    }

    #[test]
    fn session_break_excludes_long_gaps() {
        // 10, 20, then an overnight gap
        let history = history_at(&[0, 10, 30, 30 + 50_000]);
        let estimator = DistractionEstimator::default().with_session_break(Some(3600.0));
        assert_eq!(estimator.usable_gaps(&history), vec![10.0, 20.0]);
        assert!((estimator.estimate_rate(&history) - 1.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn session_break_of_zero_disables_filter() {
        let estimator = DistractionEstimator::default().with_session_break(Some(0.0));
        assert_eq!(estimator.session_break_secs(), None);
    }

    #[test]
    fn time_to_threshold_half_at_mean_gap_20() {
        let t = time_to_threshold(Threshold::new(0.5).unwrap(), 0.05, 0.0);
        assert!((t - 20.0 * std::f64::consts::LN_2).abs() < 1e-9);
        assert!((t - 13.863).abs() < 1e-3);
    }

    #[test]
    fn time_to_threshold_goes_negative_once_exceeded() {
        let target = Threshold::new(0.5).unwrap();
        assert!(time_to_threshold(target, 0.05, 10.0) > 0.0);
        assert!(time_to_threshold(target, 0.05, 20.0) < 0.0);
    }

    #[test]
    fn invalid_default_rate_rejected() {
        assert!(DistractionEstimator::new(0.0).is_err());
        assert!(DistractionEstimator::new(f64::INFINITY).is_err());
    }
}
