// This file is part of Settler.
//
// Settler is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Settler is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Settler.
// If not, see https://www.gnu.org/licenses/.


use anyhow::Context;
use clap::{Args, Parser, Subcommand};

mod json;
mod op;
mod scenario;
mod screen;
mod settings;
mod tracing;

use op::{DecodeRevertArgs, RequestIdArgs, SignArgs};
use scenario::ScenarioArgs;
use screen::CheckTraceArgs;

/// Main entry point for the CLI
///
/// Parses the CLI arguments, installs logging, loads settings and runs the
/// selected subcommand.
pub async fn run() -> anyhow::Result<()> {
    let opt = Cli::parse();
    let _guard = tracing::configure_logging(&opt.logs)?;

    let settings = settings::load_settings(opt.common.config.as_deref())
        .context("settings should load")?;
    tracing::debug!("Settings: {:#?}", settings);

    match opt.command {
        Command::RequestId(args) => op::request_id(args, &settings)?,
        Command::Sign(args) => op::sign(args, &settings)?,
        Command::DecodeRevert(args) => op::decode_revert(args)?,
        Command::CheckTrace(args) => screen::check_trace(args, &settings)?,
        Command::Scenario(args) => scenario::run(args, settings).await?,
    }

    Ok(())
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Command {
    /// Request id command
    ///
    /// Prints the request id of a user operation
    #[command(name = "request-id")]
    RequestId(RequestIdArgs),

    /// Sign command
    ///
    /// Signs a user operation's request id with a local key and prints the signed
    /// operation
    #[command(name = "sign")]
    Sign(SignArgs),

    /// Decode revert command
    ///
    /// Renders revert data returned by the coordinator
    #[command(name = "decode-revert")]
    DecodeRevert(DecodeRevertArgs),

    /// Check trace command
    ///
    /// Screens a recorded validation trace against the simulation rules
    #[command(name = "check-trace")]
    CheckTrace(CheckTraceArgs),

    /// Scenario command
    ///
    /// Runs a counterfactual wallet through simulation, settlement and replay
    /// rejection against an in-memory coordinator
    #[command(name = "scenario")]
    Scenario(ScenarioArgs),
}

/// CLI common options
#[derive(Debug, Args)]
#[command(next_help_heading = "Common")]
pub struct CommonArgs {
    /// Settings file path
    ///
    /// Any format the `config` crate understands. Values can be overridden with
    /// `SETTLER_`-prefixed environment variables, using `__` between nested keys.
    #[arg(
        long = "config",
        name = "config",
        env = "SETTLER_CONFIG",
        default_value = None,
        global = true
    )]
    config: Option<String>,
}

/// CLI options for logging
#[derive(Debug, Args)]
#[command(next_help_heading = "Logging")]
pub struct LogsArgs {
    /// Log file
    ///
    /// If not provided, logs will be written to stdout
    #[arg(
        long = "log.file",
        name = "log.file",
        env = "LOG_FILE",
        default_value = None,
        global = true
    )]
    file: Option<String>,

    /// Log JSON
    ///
    /// If set, logs will be written in JSON format
    #[arg(
        long = "log.json",
        name = "log.json",
        env = "LOG_JSON",
        required = false,
        num_args = 0,
        global = true
    )]
    json: bool,

    /// Log filter
    ///
    /// Used when `RUST_LOG` is not set
    #[arg(
        long = "log.filter",
        name = "log.filter",
        env = "LOG_FILTER",
        default_value = "info",
        global = true
    )]
    filter: String,
}

/// CLI options
#[derive(Debug, Parser)]
#[command(name = "settler", version, about)]
pub struct Cli {
    #[clap(subcommand)]
    command: Command,

    #[clap(flatten)]
    common: CommonArgs,

    #[clap(flatten)]
    logs: LogsArgs,
}
