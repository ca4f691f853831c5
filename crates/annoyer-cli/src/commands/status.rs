//! One-shot commands that act on the history outside a running session.
//!
//! Without a running session the gap being timed starts at the last
//! recorded event.

use annoyer_core::{
    AlarmController, AlarmEvent, AlarmState, DurationChoice, ModelSnapshot, Session, SilentSink,
};
use chrono::Utc;

use crate::context::Context;

fn controller_at_last_event(
    ctx: &Context,
    now: chrono::DateTime<Utc>,
) -> Result<AlarmController<SilentSink>, Box<dyn std::error::Error>> {
    let history = ctx.history();
    let started_at = history.last().unwrap_or(now);
    let mut controller = AlarmController::new(
        history,
        ctx.config.estimator()?,
        ctx.config.duration_policy,
        SilentSink,
        ctx.config.threshold()?,
        started_at,
    );
    // Evaluate once so the state reflects whether the alarm would be ringing.
    controller.tick(now);
    Ok(controller)
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;
    let now = Utc::now();
    let controller = controller_at_last_event(&ctx, now)?;
    let snapshot = controller.snapshot(now);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

pub fn ack(choice: DurationChoice) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;
    let now = Utc::now();
    let controller = controller_at_last_event(&ctx, now)?;
    let mut session = Session::new(controller, ctx.store.clone(), None);

    for event in session.acknowledge(choice, now) {
        if matches!(event, AlarmEvent::DistractionRecorded { .. }) {
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
    }
    session.close()?;
    Ok(())
}

/// Human-readable duration, e.g. `1h02m`, `3m05s`, `42s`.
pub fn format_secs(secs: f64) -> String {
    if !secs.is_finite() {
        return "never".to_string();
    }
    let sign = if secs < 0.0 { "-" } else { "" };
    let total = secs.abs().round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{sign}{h}h{m:02}m")
    } else if m > 0 {
        format!("{sign}{m}m{s:02}s")
    } else {
        format!("{sign}{s}s")
    }
}

/// One status line for the interactive session.
pub fn describe(snapshot: &ModelSnapshot) -> String {
    let due = if snapshot.time_to_threshold_secs > 0.0 {
        format!("due in {}", format_secs(snapshot.time_to_threshold_secs))
    } else {
        format!("due {} ago", format_secs(-snapshot.time_to_threshold_secs))
    };
    let state = match snapshot.state {
        AlarmState::Idle => "idle",
        AlarmState::Ringing => "RINGING",
    };
    format!(
        "p={:.3} threshold={:.3} elapsed={} {} mean gap={} events={} state={}",
        snapshot.probability,
        snapshot.threshold,
        format_secs(snapshot.elapsed_secs),
        due,
        format_secs(snapshot.mean_gap_secs),
        snapshot.event_count,
        state
    )
}
