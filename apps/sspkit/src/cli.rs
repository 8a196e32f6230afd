// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config;
use crate::session::{self, SessionOptions};

type LogInitFn = fn(&config::LogConfig) -> Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sspkit.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connects and streams until disconnected, interrupted or the duration elapses
    Run(RunArgs),
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Stop after this many seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Overrides `client.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Overrides `dump.path`
    #[arg(long)]
    pub dump: Option<String>,

    /// Print every event as a JSON line on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
}

/// Handle the "run" command
/// Exits the process on error with status code 1
// Allow eprintln before logging is initialized (CLI output)
#[allow(clippy::disallowed_macros)]
fn handle_run_command(config_path: &str, args: &RunArgs, init_logging: LogInitFn) {
    let config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    };

    if let Err(e) = init_logging(&config_result.config.log) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    let mut config = config_result.config;
    if let Some(host) = &args.host {
        config.client.host.clone_from(host);
    }
    if let Some(path) = &args.dump {
        config.dump.path = Some(path.clone());
    }

    info!(
        host = %config.client.host,
        port = config.client.port,
        stream_style = ?config.client.stream_style,
        dump = config.dump.path.as_deref().unwrap_or("off"),
        "Starting sspkit session"
    );

    let options = SessionOptions {
        duration: args.duration.map(Duration::from_secs),
        json_events: args.json,
        handle_signals: true,
        ..SessionOptions::default()
    };
    match session::run(&config, &options) {
        Ok(report) => {
            info!(reason = ?report.stop_reason, state = %report.final_state, "Session ended");
        },
        Err(e) => {
            error!(error = %format!("{e:#}"), "Session failed");
            std::process::exit(1);
        },
    }
}

/// Handle the "config default" command - print default config to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default sspkit configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
pub fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match &cli.command {
        Some(Commands::Run(args)) => handle_run_command(&cli.config, args, init_logging),
        None => handle_run_command(&cli.config, &RunArgs::default(), init_logging),
        Some(Commands::Config(ConfigCommands::Default)) => handle_config_default_command(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "sspkit", "--config", "cam.toml", "run", "--duration", "5", "--host", "10.0.0.7", "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, "cam.toml");
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.duration, Some(5));
        assert_eq!(args.host.as_deref(), Some("10.0.0.7"));
        assert!(args.json);
        assert!(args.dump.is_none());
    }

    #[test]
    fn test_parse_config_default() {
        let cli = Cli::try_parse_from(["sspkit", "config", "default"]).unwrap();
        assert_eq!(cli.config, "sspkit.toml");
        assert!(matches!(cli.command, Some(Commands::Config(ConfigCommands::Default))));
    }
}
