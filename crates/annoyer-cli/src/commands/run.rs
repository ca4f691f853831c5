use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use annoyer_core::driver::{self, Clock, DriverOutput, MonotonicClock, UserCommand};
use annoyer_core::{AlarmEvent, DurationChoice, Session, Threshold};

use super::config::save_threshold;
use super::status::{describe, format_secs};
use crate::context::Context;
use crate::sinks;

const HELP: &str = "\
commands:
  i, increase     I was distracted: record it, longer alarm next time
  d, decrease     record it, shorter alarm next time
  k, keep         record it, same alarm length
  t, threshold P  set the alarm threshold (0 < P < 1)
  s, status       show the current estimate
  q, quit         save and exit";

#[derive(Args)]
pub struct RunArgs {
    /// Alarm threshold for this session only; `t P` in the session saves it
    #[arg(long)]
    threshold: Option<f64>,
    /// Tick interval in milliseconds, for this session only
    #[arg(long)]
    tick_ms: Option<u64>,
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Command(UserCommand),
    Help,
    Empty,
}

pub fn parse_input(line: &str) -> Result<UserInput, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(UserInput::Empty);
    };
    let input = match head.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => UserInput::Command(UserCommand::Quit),
        "s" | "status" => UserInput::Command(UserCommand::Status),
        "h" | "help" | "?" => UserInput::Help,
        "t" | "threshold" => {
            let value = words
                .next()
                .ok_or_else(|| "threshold needs a value, e.g. 't 0.7'".to_string())?;
            let p = value
                .parse::<f64>()
                .map_err(|e| format!("invalid threshold '{value}': {e}"))?;
            UserInput::Command(UserCommand::SetThreshold(p))
        }
        other => {
            let choice = other
                .parse::<DurationChoice>()
                .map_err(|_| format!("unknown command '{other}' (type 'help')"))?;
            UserInput::Command(UserCommand::Acknowledge(choice))
        }
    };
    Ok(input)
}

async fn read_commands(tx: mpsc::Sender<UserCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_input(&line) {
            Ok(UserInput::Command(command)) => {
                let quit = command == UserCommand::Quit;
                if tx.send(command).await.is_err() || quit {
                    return;
                }
            }
            Ok(UserInput::Help) => println!("{HELP}"),
            Ok(UserInput::Empty) => {}
            Err(msg) => eprintln!("{msg}"),
        }
    }
    log::debug!("stdin closed; press Ctrl-C to end the session");
}

fn report(output: &DriverOutput) {
    match output {
        DriverOutput::Event(AlarmEvent::AlarmStarted {
            probability,
            threshold,
            ..
        }) => {
            println!("ALARM: p={probability:.3} reached threshold {threshold:.3}. Acknowledge with i, d or k.");
        }
        DriverOutput::Event(AlarmEvent::AlarmStopped { reason, .. }) => {
            println!("alarm stopped ({reason:?})");
        }
        DriverOutput::Event(AlarmEvent::DistractionRecorded {
            choice,
            early,
            next_duration_secs,
            event_count,
            ..
        }) => {
            let when = if *early { "early" } else { "on alarm" };
            println!(
                "recorded {choice} ({when}); next alarm {}, {event_count} events",
                format_secs(*next_duration_secs)
            );
        }
        DriverOutput::Event(AlarmEvent::ThresholdChanged { threshold, .. }) => {
            println!("threshold set to {threshold:.3}");
        }
        DriverOutput::Snapshot(snapshot) => println!("{}", describe(snapshot)),
        DriverOutput::Rejected(err) => eprintln!("rejected: {err}"),
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let Context { mut config, store } = Context::load()?;
    if let Some(p) = args.threshold {
        config.alarm.threshold = Threshold::new(p)?.value();
    }
    if let Some(ms) = args.tick_ms {
        config.driver.tick_interval_ms = ms.max(1);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async move {
        let clock = MonotonicClock::new();
        let sink = sinks::alarm_sink(&config);
        let mut session = Session::open(&config, store, sink, clock.now())?;
        if let Some(warning) = session.load_warning() {
            eprintln!("warning: {warning}");
        }
        println!("{}", describe(&session.snapshot(clock.now())));
        println!("{HELP}");

        let (tx, rx) = mpsc::channel(16);
        let input = tokio::spawn(read_commands(tx.clone()));
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(UserCommand::Quit).await;
            }
        });

        let mut new_threshold = None;
        driver::run(&mut session, &clock, config.tick_interval(), rx, |output| {
            if let DriverOutput::Event(AlarmEvent::ThresholdChanged { threshold, .. }) = &output {
                new_threshold = Some(*threshold);
            }
            report(&output);
        })
        .await;

        input.abort();
        interrupt.abort();

        if let Some(p) = new_threshold {
            if let Err(e) = save_threshold(p) {
                log::warn!("Threshold not saved: {e}");
            }
        }
        session.close()?;
        println!("session saved");
        Ok::<(), Box<dyn std::error::Error>>(())
    });
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_background();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_acknowledgements() {
        assert_eq!(
            parse_input("i").unwrap(),
            UserInput::Command(UserCommand::Acknowledge(DurationChoice::Increase))
        );
        assert_eq!(
            parse_input("  keep ").unwrap(),
            UserInput::Command(UserCommand::Acknowledge(DurationChoice::Keep))
        );
    }

    #[test]
    fn parses_threshold() {
        assert_eq!(
            parse_input("t 0.8").unwrap(),
            UserInput::Command(UserCommand::SetThreshold(0.8))
        );
        assert!(parse_input("threshold").is_err());
        assert!(parse_input("t high").is_err());
    }

    #[test]
    fn parses_control_words() {
        assert_eq!(parse_input("").unwrap(), UserInput::Empty);
        assert_eq!(parse_input("help").unwrap(), UserInput::Help);
        assert_eq!(parse_input("Q").unwrap(), UserInput::Command(UserCommand::Quit));
        assert_eq!(parse_input("s").unwrap(), UserInput::Command(UserCommand::Status));
        assert!(parse_input("snooze").is_err());
    }
}
