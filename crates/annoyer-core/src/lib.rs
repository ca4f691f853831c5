//! # Annoyer Core Library
//!
//! Core logic for Annoyer, an alarm for the easily distracted. From the
//! history of distraction events it estimates how likely the user is to be
//! distracted right now, and sounds an alarm when that likelihood crosses a
//! user-set threshold. All operations are available through the standalone
//! CLI binary, which is a thin layer over this library.
//!
//! ## Architecture
//!
//! - **Event history**: append-only, chronologically ordered log of
//!   distraction events, persisted as JSON with the chosen alarm duration
//! - **Estimator**: exponential waiting-time model fitted to inter-event gaps
//! - **Alarm controller**: wall-clock-based state machine; the caller invokes
//!   `tick(now)` periodically and forwards user acknowledgements
//! - **Driver**: async single-owner loop that ticks at a fixed cadence
//!
//! ## Key Components
//!
//! - [`AlarmController`]: Idle/Ringing state machine
//! - [`DistractionEstimator`]: rate fitting and probability queries
//! - [`EventHistory`] / [`HistoryStore`]: event log and its persistence
//! - [`Session`]: controller + store, the single owner of mutable state
//! - [`Config`]: Application configuration management

pub mod alarm;
pub mod driver;
pub mod error;
pub mod estimator;
pub mod events;
pub mod history;
pub mod session;
pub mod storage;

pub use alarm::{
    AlarmController, AlarmSink, AlarmState, DurationChoice, DurationPolicy, PolicyKind,
    RecordingSink, SilentSink,
};
pub use driver::{Clock, DriverOutput, MonotonicClock, SystemClock, UserCommand};
pub use error::{ConfigError, CoreError, HistoryError, PersistenceError, RateError, ValidationError};
pub use estimator::{DistractionEstimator, RateEstimate, RateSource, Threshold};
pub use events::{AlarmEvent, ModelSnapshot, StopReason};
pub use history::{DistractionEvent, EventHistory, Outcome, OutcomeSummary, TargetSummary};
pub use session::Session;
pub use storage::{Config, HistoryStore};
