//! How the acknowledgement controls change the next alarm duration.
//!
//! The duration is the length of the alarm sound for the next ring. It is
//! independent of the statistical model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The three acknowledgement controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationChoice {
    /// Make the next alarm longer.
    Increase,
    /// Make the next alarm shorter.
    Decrease,
    /// Leave the duration as it is.
    Keep,
}

impl DurationChoice {
    pub const ALL: [DurationChoice; 3] = [Self::Increase, Self::Decrease, Self::Keep];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
            Self::Keep => "keep",
        }
    }
}

impl fmt::Display for DurationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationChoice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "increase" | "i" | "+" => Ok(Self::Increase),
            "decrease" | "d" | "-" => Ok(Self::Decrease),
            "keep" | "k" | "=" => Ok(Self::Keep),
            other => Err(ValidationError::InvalidValue {
                field: "choice".into(),
                message: format!("expected increase, decrease or keep, got '{other}'"),
            }),
        }
    }
}

/// Maps the current duration and a control press to the next duration.
pub trait DurationPolicy {
    /// Returns the next duration in seconds. Must be finite and non-negative
    /// for any finite non-negative input.
    fn apply(&self, current_secs: f64, choice: DurationChoice) -> f64;
}

/// Serializable policy selection, as stored in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PolicyKind {
    /// Multiply or divide by `factor`.
    Multiplicative {
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default = "default_min_secs")]
        min_secs: f64,
        #[serde(default = "default_max_secs")]
        max_secs: f64,
    },
    /// Add or subtract `step_secs`.
    Step {
        #[serde(default = "default_step_secs")]
        step_secs: f64,
        #[serde(default = "default_min_secs")]
        min_secs: f64,
        #[serde(default = "default_max_secs")]
        max_secs: f64,
    },
}

fn default_factor() -> f64 {
    1.5
}
fn default_step_secs() -> f64 {
    10.0
}
fn default_min_secs() -> f64 {
    1.0
}
fn default_max_secs() -> f64 {
    3600.0
}

impl Default for PolicyKind {
    fn default() -> Self {
        Self::Multiplicative {
            factor: default_factor(),
            min_secs: default_min_secs(),
            max_secs: default_max_secs(),
        }
    }
}

impl PolicyKind {
    /// # Errors
    /// Returns [`ValidationError::InvalidValue`] for non-finite parameters,
    /// a factor not above 1, a non-positive step, or `min_secs > max_secs`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let (min, max) = match *self {
            Self::Multiplicative {
                factor,
                min_secs,
                max_secs,
            } => {
                if !(factor > 1.0 && factor.is_finite()) {
                    return Err(invalid("duration_policy.factor", "must be a finite number above 1"));
                }
                (min_secs, max_secs)
            }
            Self::Step {
                step_secs,
                min_secs,
                max_secs,
            } => {
                if !(step_secs > 0.0 && step_secs.is_finite()) {
                    return Err(invalid("duration_policy.step_secs", "must be positive and finite"));
                }
                (min_secs, max_secs)
            }
        };
        if !(min >= 0.0 && min.is_finite() && max.is_finite() && min <= max) {
            return Err(invalid(
                "duration_policy.min_secs",
                "bounds must be finite with 0 <= min_secs <= max_secs",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

impl DurationPolicy for PolicyKind {
    fn apply(&self, current_secs: f64, choice: DurationChoice) -> f64 {
        match *self {
            Self::Multiplicative {
                factor,
                min_secs,
                max_secs,
            } => {
                let next = match choice {
                    DurationChoice::Increase => current_secs * factor,
                    DurationChoice::Decrease => current_secs / factor,
                    DurationChoice::Keep => return current_secs,
                };
                next.max(min_secs).min(max_secs)
            }
            Self::Step {
                step_secs,
                min_secs,
                max_secs,
            } => {
                let next = match choice {
                    DurationChoice::Increase => current_secs + step_secs,
                    DurationChoice::Decrease => current_secs - step_secs,
                    DurationChoice::Keep => return current_secs,
                };
                next.max(min_secs).min(max_secs)
            }
        }
    }
}

impl<F> DurationPolicy for F
where
    F: Fn(f64, DurationChoice) -> f64,
{
    fn apply(&self, current_secs: f64, choice: DurationChoice) -> f64 {
        self(current_secs, choice)
    }
}
