//! The audible side of the alarm.

/// Capability invoked on alarm state transitions.
///
/// The controller calls `start_alarm` exactly once per IDLE → RINGING
/// transition and `stop_alarm` exactly once per RINGING → IDLE transition.
pub trait AlarmSink {
    /// Begin sounding. `duration_secs` is the user's chosen alarm length.
    fn start_alarm(&mut self, duration_secs: f64);

    /// Silence the alarm.
    fn stop_alarm(&mut self);

    /// Called on every tick while ringing, so a sink whose sound has run out
    /// can start it again.
    fn sustain(&mut self) {}
}

impl<S: AlarmSink + ?Sized> AlarmSink for Box<S> {
    fn start_alarm(&mut self, duration_secs: f64) {
        (**self).start_alarm(duration_secs);
    }

    fn stop_alarm(&mut self) {
        (**self).stop_alarm();
    }

    fn sustain(&mut self) {
        (**self).sustain();
    }
}

/// A sink that makes no sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl AlarmSink for SilentSink {
    fn start_alarm(&mut self, _duration_secs: f64) {}

    fn stop_alarm(&mut self) {}
}

/// Counts invocations. Useful for driving the controller from tests and
/// for headless status queries.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingSink {
    pub starts: usize,
    pub stops: usize,
    pub sustains: usize,
    pub last_duration_secs: Option<f64>,
}

impl AlarmSink for RecordingSink {
    fn start_alarm(&mut self, duration_secs: f64) {
        self.starts += 1;
        self.last_duration_secs = Some(duration_secs);
    }

    fn stop_alarm(&mut self) {
        self.stops += 1;
    }

    fn sustain(&mut self) {
        self.sustains += 1;
    }
}
