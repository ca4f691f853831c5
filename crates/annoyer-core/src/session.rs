//! A running session: the controller plus the store it persists to.
//!
//! The session is the single owner of all mutable state. Clock drivers and
//! user interfaces hold a `&mut Session` and go through it for every tick,
//! acknowledgement and threshold change, which keeps those calls serialised.

use chrono::{DateTime, Utc};

use crate::alarm::{AlarmController, AlarmSink, DurationChoice, DurationPolicy, PolicyKind};
use crate::error::{ConfigError, PersistenceError, ValidationError};
use crate::events::{AlarmEvent, ModelSnapshot};
use crate::storage::{Config, HistoryStore};

pub struct Session<S, P = PolicyKind> {
    controller: AlarmController<S, P>,
    store: HistoryStore,
    load_warning: Option<PersistenceError>,
}

impl<S: AlarmSink> Session<S> {
    /// Load the history from `store` and build a controller from `config`.
    ///
    /// `now` is recorded as a session start, so the first gap of the session
    /// is timed from it.
    ///
    /// A broken history file does not fail the session: it starts empty and
    /// the problem is available from [`Session::load_warning`].
    ///
    /// # Errors
    /// Returns an error if the threshold or model parameters in `config`
    /// are invalid.
    pub fn open(
        config: &Config,
        store: HistoryStore,
        sink: S,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let threshold = config.threshold()?;
        let estimator = config.estimator()?;
        config.duration_policy.validate()?;

        let loaded = store.load(config.alarm.default_duration_secs);

        let controller = AlarmController::new(
            loaded.history,
            estimator,
            config.duration_policy,
            sink,
            threshold,
            now,
        );
        Ok(Self::new(controller, store, loaded.warning))
    }
}

impl<S: AlarmSink, P: DurationPolicy> Session<S, P> {
    pub fn new(
        controller: AlarmController<S, P>,
        store: HistoryStore,
        load_warning: Option<PersistenceError>,
    ) -> Self {
        Self {
            controller,
            store,
            load_warning,
        }
    }

    pub fn controller(&self) -> &AlarmController<S, P> {
        &self.controller
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// The reason the history file was discarded at startup, if it was.
    pub fn load_warning(&self) -> Option<&PersistenceError> {
        self.load_warning.as_ref()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ModelSnapshot {
        self.controller.snapshot(now)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<AlarmEvent> {
        self.controller.tick(now)
    }

    /// Record a distraction and persist immediately.
    ///
    /// A failed save is logged and the session continues; the next
    /// acknowledgement or [`Session::close`] tries again.
    pub fn acknowledge(&mut self, choice: DurationChoice, now: DateTime<Utc>) -> Vec<AlarmEvent> {
        let events = self.controller.acknowledge(choice, now);
        self.persist();
        events
    }

    pub fn set_threshold(&mut self, p: f64, now: DateTime<Utc>) -> Result<AlarmEvent, ValidationError> {
        self.controller.set_threshold(p, now)
    }

    /// Silence the alarm and write the history.
    ///
    /// # Errors
    /// Returns the save error, if any.
    pub fn close(mut self) -> Result<S, PersistenceError> {
        self.controller.halt();
        self.store.save(self.controller.history())?;
        Ok(self.controller.into_sink())
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(self.controller.history()) {
            log::warn!("{err}; history kept in memory");
        }
    }
}
