mod controller;
mod policy;
mod sink;

pub use controller::{AlarmController, AlarmState};
pub use policy::{DurationChoice, DurationPolicy, PolicyKind};
pub use sink::{AlarmSink, RecordingSink, SilentSink};
