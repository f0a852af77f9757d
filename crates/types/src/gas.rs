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

use std::cmp;

use alloy_primitives::U256;

/// Gas fees for a user operation
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GasFees {
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: U256,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: U256,
}

impl GasFees {
    /// Get the gas price from these fees given a base fee
    pub fn gas_price(self, base_fee: U256) -> U256 {
        cmp::min(
            self.max_fee_per_gas,
            base_fee.saturating_add(self.max_priority_fee_per_gas),
        )
    }
}

/// Calldata gas of a payload: 4 per zero byte, 16 per non-zero byte
pub fn call_data_cost(data: &[u8]) -> u64 {
    data.iter().map(|&b| if b == 0 { 4 } else { 16 }).sum()
}
