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


use serde::{Deserialize, Serialize};
use settler_types::CallError;

/// Fixed gas prices of the ledger's primitive actions
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Entering a child frame
    pub call: u64,
    /// Reading a storage slot
    pub sload: u64,
    /// Writing a storage slot
    pub sstore: u64,
    /// Recovering a signer
    pub ecrecover: u64,
    /// Moving a non-zero value
    pub value_transfer: u64,
    /// Reading the block or call environment
    pub env_read: u64,
    /// Deploying an account
    pub create_account: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            call: 700,
            sload: 2_100,
            sstore: 5_000,
            ecrecover: 3_000,
            value_transfer: 9_000,
            env_read: 2,
            create_account: 32_000,
        }
    }
}

/// Gas budget of one phase of an operation
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    /// A meter allowing up to `limit` gas
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// A meter that never runs out
    pub fn unmetered() -> Self {
        Self::new(u64::MAX)
    }

    /// Consume `amount`, failing once the limit is crossed. A failed charge exhausts the
    /// meter.
    pub fn charge(&mut self, amount: u64) -> Result<(), CallError> {
        match self.used.checked_add(amount) {
            Some(used) if used <= self.limit => {
                self.used = used;
                Ok(())
            }
            _ => {
                self.used = self.limit;
                Err(CallError::OutOfGas)
            }
        }
    }

    /// Gas consumed so far
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Gas still available
    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_within_limit() {
        let mut meter = GasMeter::new(1_000);
        meter.charge(400).unwrap();
        meter.charge(600).unwrap();
        assert_eq!(meter.used(), 1_000);
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn overrun_exhausts_meter() {
        let mut meter = GasMeter::new(1_000);
        meter.charge(400).unwrap();
        assert_eq!(meter.charge(601), Err(CallError::OutOfGas));
        assert_eq!(meter.used(), 1_000);
        assert_eq!(meter.charge(1), Err(CallError::OutOfGas));
    }

    #[test]
    fn schedule_reads_partial_config() {
        let schedule: GasSchedule = serde_json::from_str(r#"{"sload": 800}"#).unwrap();
        assert_eq!(schedule.sload, 800);
        assert_eq!(schedule.call, GasSchedule::default().call);
    }
}
