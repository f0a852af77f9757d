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


use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

use crate::gas::GasSchedule;

/// Address the coordinator runs at unless configured otherwise
pub const DEFAULT_ENTRY_POINT_ADDRESS: Address =
    address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// Coordinator deployment parameters
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EntryPointSettings {
    /// Address of the coordinator, part of every request id
    pub address: Address,
    /// Chain id, part of every request id
    pub chain_id: u64,
    /// Minimum stake a paymaster must lock
    pub min_stake: U256,
    /// Minimum unstake delay a paymaster must commit to
    pub min_unstake_delay_sec: u64,
    /// Gas limit of direct calls
    pub call_gas_limit: u64,
    /// Prices of ledger primitives
    pub gas: GasSchedule,
}

impl Default for EntryPointSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ENTRY_POINT_ADDRESS,
            chain_id: 1337,
            min_stake: U256::from(10).pow(U256::from(18)),
            min_unstake_delay_sec: 86_400,
            call_gas_limit: 30_000_000,
            gas: GasSchedule::default(),
        }
    }
}
