//! `sonatad` - command-line front end for the observing control core.
//!
//! A thin dispatcher: parses arguments, loads configuration, and hands off
//! to `sonata-core`. No observing semantics live here.

mod commands;
mod config_path;
mod error;

use clap::{Parser, Subcommand};

use error::CliError;

#[derive(Parser)]
#[command(name = "sonatad", version, about = "SonATA observing control core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring up the scheduler and serve until interrupted.
    Run {
        #[arg(long)]
        config: Option<std::path::PathBuf>,

        /// Enqueue one strategy at startup under this name.
        #[arg(long)]
        strategy_name: Option<String>,

        #[arg(long, default_value = "target-obs")]
        activity_type: String,

        /// Comma-separated beam names the strategy points.
        #[arg(long, value_delimiter = ',', default_value = "beam1")]
        beams: Vec<String>,

        #[arg(long, value_enum, default_value = "auto")]
        selection_mode: commands::run::SelectionModeArg,

        #[arg(long)]
        target_id: Option<i64>,

        #[arg(long, default_value_t = 1419.5)]
        range_low_mhz: f64,

        #[arg(long, default_value_t = 1420.5)]
        range_high_mhz: f64,

        #[arg(long, default_value_t = 0.7)]
        bandwidth_mhz: f64,

        /// Log an invalid selected target instead of failing the activity.
        #[arg(long)]
        warn_only_target_validation: bool,
    },

    /// Print the facility's last-written status snapshot.
    Status {
        #[arg(long)]
        config: Option<std::path::PathBuf>,
    },

    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            strategy_name,
            activity_type,
            beams,
            selection_mode,
            target_id,
            range_low_mhz,
            range_high_mhz,
            bandwidth_mhz,
            warn_only_target_validation,
        } => commands::run::run(commands::run::RunArgs {
            config,
            strategy_name,
            activity_type,
            beams,
            selection_mode,
            target_id,
            range_low_mhz,
            range_high_mhz,
            bandwidth_mhz,
            warn_only_target_validation,
        }),
        Commands::Status { config } => commands::status::run(commands::status::StatusArgs { config }),
        Commands::Config { command } => commands::config::run(command),
    }
}
