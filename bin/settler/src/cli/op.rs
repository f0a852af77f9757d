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


use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use secrecy::SecretString;
use settler_signer::{recover_signer, sign_user_op, signer_from_private_key};
use settler_types::{revert, UserOperation};

use super::{json::read_json_file, settings::Settings};

/// CLI options for the request id command
#[derive(Debug, Args)]
pub struct RequestIdArgs {
    /// JSON file holding the user operation
    #[arg(long = "op", name = "op")]
    op: PathBuf,
}

/// Print the request id the configured coordinator assigns to an operation
pub fn request_id(args: RequestIdArgs, settings: &Settings) -> anyhow::Result<()> {
    let op: UserOperation = read_json_file(&args.op)?;
    let request_id = op.request_id(settings.entry_point.address, settings.entry_point.chain_id);
    println!("{request_id}");
    Ok(())
}

/// CLI options for the sign command
#[derive(Args)]
pub struct SignArgs {
    /// JSON file holding the user operation
    #[arg(long = "op", name = "op")]
    op: PathBuf,

    /// Private key of the wallet owner
    #[arg(
        long = "signer.private_key",
        name = "signer.private_key",
        env = "SIGNER_PRIVATE_KEY",
        hide_env_values = true
    )]
    private_key: String,
}

impl std::fmt::Debug for SignArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignArgs")
            .field("op", &self.op)
            .finish_non_exhaustive()
    }
}

/// Sign an operation for the configured coordinator and print it as JSON
pub fn sign(args: SignArgs, settings: &Settings) -> anyhow::Result<()> {
    let op: UserOperation = read_json_file(&args.op)?;
    let signer = signer_from_private_key(&SecretString::from(args.private_key))
        .context("should parse private key")?;
    let signed = sign_user_op(
        &signer,
        op,
        settings.entry_point.address,
        settings.entry_point.chain_id,
    )?;

    let request_id =
        signed.request_id(settings.entry_point.address, settings.entry_point.chain_id);
    tracing::info!(
        "Signed {request_id} as {}",
        recover_signer(request_id, &signed.signature)?
    );
    println!("{}", serde_json::to_string_pretty(&signed)?);
    Ok(())
}

/// CLI options for the decode revert command
#[derive(Debug, Args)]
pub struct DecodeRevertArgs {
    /// Hex-encoded revert data, with or without the `0x` prefix
    data: String,
}

/// Print revert data in readable form
pub fn decode_revert(args: DecodeRevertArgs) -> anyhow::Result<()> {
    let data = const_hex::decode(args.data.trim()).context("revert data should be hex")?;
    println!("{}", revert::decode_revert_reason_or_hex(&data));
    Ok(())
}
