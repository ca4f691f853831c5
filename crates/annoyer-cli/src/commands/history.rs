use clap::Subcommand;
use serde::Serialize;

use annoyer_core::{OutcomeSummary, RateSource, TargetSummary};

use super::status::format_secs;
use crate::context::Context;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List recorded events
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summary statistics
    Stats,
    /// Delete every recorded event
    Clear,
}

#[derive(Serialize)]
struct HistoryStats {
    event_count: usize,
    gap_count: usize,
    /// Gaps that take part in the fit (session breaks excluded).
    fitted_gap_count: usize,
    mean_gap_secs: f64,
    rate: f64,
    rate_source: RateSource,
    next_duration_secs: f64,
    outcomes: OutcomeSummary,
    /// Actual gaps against the gaps predicted when each was acknowledged.
    targets: Option<TargetSummary>,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;

    match action {
        HistoryAction::Show { json } => {
            let history = ctx.history();
            if json {
                println!("{}", serde_json::to_string_pretty(history.events())?);
            } else if history.is_empty() {
                println!("no events recorded");
            } else {
                let gaps = history.gaps();
                for (i, event) in history.events().iter().enumerate() {
                    let gap = i
                        .checked_sub(1)
                        .and_then(|j| gaps.get(j))
                        .map(|g| format_secs(*g))
                        .unwrap_or_else(|| "-".to_string());
                    let outcome = event
                        .outcome
                        .map(|o| {
                            let early = if o.early { " (early)" } else { "" };
                            match o.target_secs {
                                Some(target) => format!("{}{early}, due after {}", o.choice, format_secs(target)),
                                None => format!("{}{early}", o.choice),
                            }
                        })
                        .unwrap_or_default();
                    println!("{}  {:>8}  {}", event.at.to_rfc3339(), gap, outcome);
                }
            }
        }
        HistoryAction::Stats => {
            let history = ctx.history();
            let estimator = ctx.config.estimator()?;
            let estimate = estimator.estimate(&history);
            let stats = HistoryStats {
                event_count: history.len(),
                gap_count: history.gaps().len(),
                fitted_gap_count: estimator.usable_gaps(&history).len(),
                mean_gap_secs: estimate.mean_gap_secs(),
                rate: estimate.rate,
                rate_source: estimate.source,
                next_duration_secs: history.next_duration_secs(),
                outcomes: history.outcome_summary(),
                targets: history.target_summary(),
            };
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        HistoryAction::Clear => {
            let mut history = ctx.history();
            let removed = history.len();
            history.clear();
            ctx.store.save(&history)?;
            println!("cleared {removed} events");
        }
    }
    Ok(())
}
