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

use alloy_primitives::{Bytes, U256};
use serde::Serialize;

/// Result of validating a single operation
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutput {
    /// Gas used before execution: pre-verification gas plus every validation frame
    pub pre_op_gas: U256,
    /// Amount collected from the payer ahead of execution
    pub prefund: U256,
    /// Gas price the operation settles at
    pub gas_price: U256,
    /// Context returned by the paymaster, handed back to its post-op hook
    pub paymaster_context: Bytes,
    /// Stake of the paymaster, when there is one
    pub paymaster_info: Option<StakeInfo>,
}

/// Stake of an entity as seen by validation
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfo {
    /// Locked stake
    pub stake: U256,
    /// Delay between unlocking and withdrawing
    pub unstake_delay_sec: u64,
}

/// Funds the coordinator holds on behalf of an account
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInfo {
    /// Balance usable for paying fees
    pub deposit: U256,
    /// Whether the stake is locked
    pub staked: bool,
    /// Locked stake
    pub stake: U256,
    /// Delay between unlocking and withdrawing
    pub unstake_delay_sec: u64,
    /// Earliest withdraw time once unlocked, zero while locked
    pub withdraw_time: u64,
}

impl DepositInfo {
    /// Stake part of this record
    pub fn stake_info(&self) -> StakeInfo {
        StakeInfo {
            stake: self.stake,
            unstake_delay_sec: self.unstake_delay_sec,
        }
    }

    /// Whether the account is staked with at least the given stake and delay
    pub fn is_staked(&self, min_stake: U256, min_unstake_delay: u64) -> bool {
        self.staked && self.stake >= min_stake && self.unstake_delay_sec >= min_unstake_delay
    }
}

/// Outcome of the execution phase as reported to a paymaster's post-op hook
#[derive(Clone, Copy, Debug, Eq, PartialEq, parse_display::Display)]
#[display(style = "camelCase")]
pub enum PostOpMode {
    /// Execution completed
    OpSucceeded,
    /// Execution failed and was rolled back
    OpReverted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staked_requires_lock_and_minimums() {
        let mut info = DepositInfo {
            deposit: U256::ZERO,
            staked: true,
            stake: U256::from(100),
            unstake_delay_sec: 60,
            withdraw_time: 0,
        };
        assert!(info.is_staked(U256::from(100), 60));
        assert!(!info.is_staked(U256::from(101), 60));
        assert!(!info.is_staked(U256::from(100), 61));
        info.staked = false;
        assert!(!info.is_staked(U256::ZERO, 0));
    }
}
