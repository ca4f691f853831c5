//! Periodic tick driver.
//!
//! A single async task owns the session. It ticks the controller at a fixed
//! cadence and applies user commands received over a channel between ticks,
//! so no two operations ever interleave. Nothing here blocks; dropping the
//! command sender or sending [`UserCommand::Quit`] ends the loop.
//!
//! ## Usage
//!
//! ```ignore
//! let (tx, rx) = tokio::sync::mpsc::channel(16);
//! let clock = MonotonicClock::new();
//! driver::run(&mut session, &clock, config.tick_interval(), rx, |out| println!("{out:?}")).await;
//! session.close()?;
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::alarm::{AlarmSink, DurationChoice, DurationPolicy};
use crate::error::ValidationError;
use crate::events::{AlarmEvent, ModelSnapshot};
use crate::session::Session;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock time anchored once, then advanced by the monotonic clock.
///
/// Immune to wall-clock jumps during a session. Under a paused tokio runtime
/// it follows virtual time.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor: DateTime<Utc>,
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.origin.elapsed())
            .ok()
            .and_then(|elapsed| self.anchor.checked_add_signed(elapsed))
            .unwrap_or(self.anchor)
    }
}

/// Input from the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Acknowledge(DurationChoice),
    SetThreshold(f64),
    Status,
    Quit,
}

/// What the driver reports back to the interface.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOutput {
    Event(AlarmEvent),
    Snapshot(ModelSnapshot),
    /// A command was refused; the session is unchanged.
    Rejected(ValidationError),
}

/// Drive `session` until the command channel closes or `Quit` arrives.
///
/// Returns the number of ticks evaluated.
pub async fn run<S, P, C, F>(
    session: &mut Session<S, P>,
    clock: &C,
    cadence: Duration,
    mut commands: mpsc::Receiver<UserCommand>,
    mut on_output: F,
) -> u64
where
    S: AlarmSink,
    P: DurationPolicy,
    C: Clock,
    F: FnMut(DriverOutput),
{
    let mut interval = tokio::time::interval(cadence.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = 0u64;

    log::debug!("Driver started, cadence {cadence:?}");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                ticks += 1;
                if let Some(event) = session.tick(clock.now()) {
                    on_output(DriverOutput::Event(event));
                }
            }
            command = commands.recv() => {
                let now = clock.now();
                match command {
                    None | Some(UserCommand::Quit) => break,
                    Some(UserCommand::Acknowledge(choice)) => {
                        for event in session.acknowledge(choice, now) {
                            on_output(DriverOutput::Event(event));
                        }
                    }
                    Some(UserCommand::SetThreshold(p)) => match session.set_threshold(p, now) {
                        Ok(event) => on_output(DriverOutput::Event(event)),
                        Err(err) => {
                            log::warn!("{err}");
                            on_output(DriverOutput::Rejected(err));
                        }
                    },
                    Some(UserCommand::Status) => {
                        on_output(DriverOutput::Snapshot(session.snapshot(now)));
                    }
                }
            }
        }
    }
    log::debug!("Driver stopped after {ticks} ticks");
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_is_close_to_now() {
        let diff = (Utc::now() - SystemClock.now()).num_seconds().abs();
        assert!(diff < 5);
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_virtual_time() {
        let anchor = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let clock = MonotonicClock::starting_at(anchor);
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!((clock.now() - anchor).num_seconds(), 90);
    }
}
