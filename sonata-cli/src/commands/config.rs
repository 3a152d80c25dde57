//! Configuration inspection CLI commands.
//!
//! Provides `config show` and `config path`: operators edit `sonata.ini`
//! by hand, the CLI just resolves and displays it.

use clap::Subcommand;
use sonata_core::app::AppConfig;

use crate::config_path::config_file_path;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration as it would be loaded at startup.
    Show {
        /// Path to the ini config file. Defaults to the platform config dir.
        #[arg(long)]
        config: Option<std::path::PathBuf>,
    },

    /// Print the configuration file path that would be used by default.
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { config } => run_show(config),
        ConfigCommands::Path => run_path(),
    }
}

fn run_show(config_path: Option<std::path::PathBuf>) -> Result<(), CliError> {
    let path = config_path.unwrap_or_else(config_file_path);
    let config = AppConfig::load(&path)?;

    println!("Configuration ({})", path.display());
    println!("===============");
    println!();
    println!("[archive]");
    println!("  root = {}", config.archive.root.display());
    println!("  activity_id_counter_file = {}", config.archive.activity_id_counter_file.display());
    println!("  expected_components_manifest = {}", config.archive.expected_components_manifest.display());
    println!();
    println!("[network]");
    println!("  tscope_bind_addr = {}", config.network.tscope_bind_addr);
    println!("  ifc_bind_addr = {}", config.network.ifc_bind_addr);
    println!("  dx_bind_addr = {}", config.network.dx_bind_addr);
    println!();
    println!("[scheduler]");
    println!("  stop_on_strategy_failure = {}", config.scheduler.stop_on_strategy_failure);
    println!("  status_snapshot_interval_secs = {}", config.scheduler.status_snapshot_interval_secs);

    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
