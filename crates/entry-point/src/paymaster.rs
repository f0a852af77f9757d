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


use std::collections::HashSet;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use settler_types::{CallError, PostOpMode, UserOperation};

use crate::{account::Paymaster, context::CallContext, state::Storage};

/// Pays for operations of an allowlisted set of senders and tallies what each one cost.
#[derive(Clone, Debug, Default)]
pub struct SponsorPaymaster {
    sponsored: HashSet<Address>,
}

impl SponsorPaymaster {
    /// A paymaster sponsoring `senders`
    pub fn new(senders: impl IntoIterator<Item = Address>) -> Self {
        Self {
            sponsored: senders.into_iter().collect(),
        }
    }

    /// Total fees paid on behalf of `sender`
    pub fn spent(storage: &Storage, sender: Address) -> U256 {
        storage.get(&spent_slot(sender)).copied().unwrap_or_default()
    }
}

fn spent_slot(sender: Address) -> B256 {
    keccak256(sender)
}

impl Paymaster for SponsorPaymaster {
    fn validate_paymaster_user_op(
        &self,
        _ctx: &mut CallContext<'_>,
        op: &UserOperation,
        _request_id: B256,
        _max_cost: U256,
    ) -> Result<Bytes, CallError> {
        if !self.sponsored.contains(&op.sender) {
            return Err(CallError::Revert(
                "paymaster: sender not sponsored".to_string(),
            ));
        }
        Ok(op.sender.abi_encode().into())
    }

    fn post_op(
        &self,
        ctx: &mut CallContext<'_>,
        _mode: PostOpMode,
        context: &Bytes,
        actual_gas_cost: U256,
    ) -> Result<(), CallError> {
        let sender = Address::abi_decode(context)
            .map_err(|e| CallError::Revert(format!("paymaster: bad context: {e}")))?;
        let slot = spent_slot(sender);
        let spent = ctx.sload(slot)?;
        ctx.sstore(slot, spent.saturating_add(actual_gas_cost))
    }
}
