//! CLI argument parsing module
//!
//! Handles command-line interface using clap, including:
//! - `run`: start the audit agent in the foreground
//! - `check-config`: validate a configuration file and print the effective settings
//! - `query`: print the event queries derived from the configured filters
//! - Help and version commands

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Run { config_path: Option<PathBuf> },
    CheckConfig { config_path: Option<PathBuf> },
    Query { config_path: Option<PathBuf> },
}

impl CliCommand {
    pub fn config_path(&self) -> Option<&PathBuf> {
        match self {
            CliCommand::Run { config_path }
            | CliCommand::CheckConfig { config_path }
            | CliCommand::Query { config_path } => config_path.as_ref(),
        }
    }
}

fn version() -> &'static str {
    concat!(env!("PROCAUDIT_VERSION"), " (", env!("GIT_HASH"), ")")
}

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .help("Configuration file (default: platform config dir/procaudit/procaudit.toml)")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

/// Build the clap command tree
pub fn build_cli() -> Command {
    Command::new("procaudit")
        .version(version())
        .about("Audit process start and stop events with their owning identity")
        .long_about(
            "Watches process creation and termination, filters them by process name, \
             and logs one audit record per event including the owner identity. \
             The identity captured at start is reported again when the process stops.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run the audit agent until interrupted (Ctrl-C or SIGTERM)")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a configuration file and print the effective settings")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("query")
                .about("Print the process event queries derived from the configured filters")
                .arg(config_arg()),
        )
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliCommand> {
    let matches = build_cli().get_matches();
    command_from_matches(&matches)
}

/// Parse an explicit argument list; errors instead of exiting
pub fn parse_args_from<I, T>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_cli().try_get_matches_from(args)?;
    command_from_matches(&matches)
}

fn command_from_matches(matches: &ArgMatches) -> Result<CliCommand> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("No command given"))?;

    let config_path = sub.get_one::<PathBuf>("config").cloned();
    if let Some(ref path) = config_path {
        if !path.exists() {
            return Err(anyhow!("Configuration file not found: {}", path.display()));
        }
    }

    match name {
        "run" => Ok(CliCommand::Run { config_path }),
        "check-config" => Ok(CliCommand::CheckConfig { config_path }),
        "query" => Ok(CliCommand::Query { config_path }),
        other => Err(anyhow!("Unknown command: {}", other)),
    }
}
