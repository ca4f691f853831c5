use clap::{Parser, Subcommand};

mod commands;
mod context;
mod sinks;

#[derive(Parser)]
#[command(name = "annoyer", version, about = "Annoyer CLI: an alarm for the easily distracted")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive alarm session
    Run(commands::run::RunArgs),
    /// Print the current distraction estimate as JSON
    Status,
    /// Record a distraction now
    Ack {
        /// How to change the next alarm duration: increase, decrease or keep
        choice: annoyer_core::DurationChoice,
    },
    /// Set the alarm threshold, strictly between 0 and 1
    Threshold {
        value: f64,
    },
    /// Event history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Status => commands::status::run(),
        Commands::Ack { choice } => commands::status::ack(choice),
        Commands::Threshold { value } => commands::config::set_threshold(value),
        Commands::History { action } => commands::history::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
