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

//! Human-readable rendering of revert payloads

use alloy_primitives::Address;
use alloy_sol_types::{Panic, Revert, SolError};

use crate::contracts::FailedOp;

/// Render a revert payload as `Error(msg)`, `FailedOp(index, paymaster, msg)` or
/// `Panic(description)`. Returns `None` for any other payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if let Ok(revert) = Revert::abi_decode(data) {
        return Some(format!("Error({})", revert.reason()));
    }
    if let Ok(failed) = FailedOp::abi_decode(data) {
        let paymaster = if failed.paymaster == Address::ZERO {
            "none".to_string()
        } else {
            failed.paymaster.to_string()
        };
        return Some(format!(
            "FailedOp({}, {paymaster}, {})",
            failed.opIndex, failed.reason
        ));
    }
    if let Ok(panic) = Panic::abi_decode(data) {
        let description = match panic.kind() {
            Some(kind) => kind.as_str().to_string(),
            None => format!("{:#x}", panic.code),
        };
        return Some(format!("Panic({description})"));
    }
    None
}

/// Like [`decode_revert_reason`], falling back to the hex payload
pub fn decode_revert_reason_or_hex(data: &[u8]) -> String {
    decode_revert_reason(data).unwrap_or_else(|| const_hex::encode_prefixed(data))
}
