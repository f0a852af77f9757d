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


use std::{fs, path::PathBuf};

use alloy_primitives::Address;
use anyhow::{bail, Context};
use clap::Args;
use settler_sim::{SimulationGuard, StructLogTrace};
use settler_types::UserOperation;

use super::{json::read_json_file, settings::Settings};

/// CLI options for the check trace command
#[derive(Debug, Args)]
pub struct CheckTraceArgs {
    /// File holding `debug_traceCall` struct logs, either bare or as a JSON-RPC response
    #[arg(long = "trace", name = "trace")]
    trace: PathBuf,

    /// JSON file holding the traced user operation
    #[arg(long = "op", name = "op", conflicts_with = "paymaster")]
    op: Option<PathBuf>,

    /// Paymaster of the traced operation, when no operation file is given
    ///
    /// Without a paymaster only the account phase is screened.
    #[arg(long = "paymaster", name = "paymaster")]
    paymaster: Option<Address>,
}

/// Screen a recorded trace and fail if it breaks any rule
pub fn check_trace(args: CheckTraceArgs, settings: &Settings) -> anyhow::Result<()> {
    let op = match &args.op {
        Some(path) => read_json_file::<UserOperation>(path)?,
        None => UserOperation {
            paymaster: args.paymaster,
            ..Default::default()
        },
    };
    let trace: StructLogTrace = fs::read_to_string(&args.trace)
        .with_context(|| format!("should read {}", args.trace.display()))?
        .parse()?;

    let guard = SimulationGuard::new(settings.simulation.guard.clone());
    let violations = guard.check(&op, trace.trace());
    if violations.is_empty() {
        println!("ok: {} steps", trace.trace().len());
        return Ok(());
    }
    for violation in &violations {
        println!("{violation}");
    }
    bail!("trace breaks {} rule(s)", violations.len())
}
