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

use alloy_primitives::{Address, B256, U256};
use parse_display::Display;
use serde::Serialize;

/// Settlement record of a single operation
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationEvent {
    /// Request id of the operation
    pub request_id: B256,
    /// Wallet that executed it
    pub sender: Address,
    /// Paymaster that paid for it, if any
    pub paymaster: Option<Address>,
    /// Nonce of the operation
    pub nonce: U256,
    /// Whether the execution phase completed
    pub success: bool,
    /// Fee charged to the payer
    pub actual_gas_cost: U256,
    /// Effective gas price
    pub actual_gas_price: U256,
}

impl std::fmt::Display for UserOperationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UserOperationEvent(requestId: {}, sender: {}, paymaster: ",
            self.request_id, self.sender
        )?;
        match self.paymaster {
            Some(paymaster) => write!(f, "{paymaster}")?,
            None => f.write_str("none")?,
        }
        write!(
            f,
            ", nonce: {}, success: {}, actualGasCost: {}, actualGasPrice: {})",
            self.nonce, self.success, self.actual_gas_cost, self.actual_gas_price
        )
    }
}

/// Emitted next to a failed [`UserOperationEvent`] with the execution failure reason
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[display("UserOperationRevertReason(requestId: {request_id}, sender: {sender}, reason: {revert_reason})")]
#[serde(rename_all = "camelCase")]
pub struct UserOperationRevertReason {
    /// Request id of the operation
    pub request_id: B256,
    /// Wallet that executed it
    pub sender: Address,
    /// Nonce of the operation
    pub nonce: U256,
    /// Why execution failed
    pub revert_reason: String,
}

/// Everything the coordinator logs
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EntryPointEvent {
    /// An operation settled
    #[display("{0}")]
    UserOperation(UserOperationEvent),
    /// An operation's execution failed
    #[display("{0}")]
    RevertReason(UserOperationRevertReason),
    /// A factory deployed an account for an operation
    #[display("AccountDeployed(requestId: {request_id}, sender: {sender}, factory: {factory})")]
    #[serde(rename_all = "camelCase")]
    AccountDeployed {
        /// Request id of the deploying operation
        request_id: B256,
        /// Deployed account
        sender: Address,
        /// Factory that deployed it
        factory: Address,
    },
    /// Funds were added to an account's deposit
    #[display("Deposited(account: {account}, totalDeposit: {total_deposit})")]
    #[serde(rename_all = "camelCase")]
    Deposited {
        /// Account credited
        account: Address,
        /// Deposit after the credit
        total_deposit: U256,
    },
    /// Deposit was withdrawn
    #[display("Withdrawn(account: {account}, withdrawAddress: {withdraw_address}, amount: {amount})")]
    #[serde(rename_all = "camelCase")]
    Withdrawn {
        /// Account debited
        account: Address,
        /// Recipient of the funds
        withdraw_address: Address,
        /// Amount withdrawn
        amount: U256,
    },
    /// Stake was added or its delay extended
    #[display("StakeLocked(account: {account}, totalStaked: {total_staked}, unstakeDelaySec: {unstake_delay_sec})")]
    #[serde(rename_all = "camelCase")]
    StakeLocked {
        /// Staked account
        account: Address,
        /// Stake after the change
        total_staked: U256,
        /// Unstake delay after the change
        unstake_delay_sec: u64,
    },
    /// Stake unlock started
    #[display("StakeUnlocked(account: {account}, withdrawTime: {withdraw_time})")]
    #[serde(rename_all = "camelCase")]
    StakeUnlocked {
        /// Unstaking account
        account: Address,
        /// Earliest time the stake may be withdrawn
        withdraw_time: u64,
    },
    /// Unlocked stake was withdrawn
    #[display("StakeWithdrawn(account: {account}, withdrawAddress: {withdraw_address}, amount: {amount})")]
    #[serde(rename_all = "camelCase")]
    StakeWithdrawn {
        /// Unstaked account
        account: Address,
        /// Recipient of the funds
        withdraw_address: Address,
        /// Amount withdrawn
        amount: U256,
    },
}

impl EntryPointEvent {
    /// The settlement record, if this is one
    pub fn as_user_operation(&self) -> Option<&UserOperationEvent> {
        match self {
            EntryPointEvent::UserOperation(event) => Some(event),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_record_display() {
        let mut event = UserOperationEvent {
            request_id: B256::ZERO,
            sender: Address::repeat_byte(0x11),
            paymaster: None,
            nonce: U256::from(3),
            success: true,
            actual_gas_cost: U256::from(42_000),
            actual_gas_price: U256::from(2),
        };
        assert_eq!(
            EntryPointEvent::UserOperation(event.clone()).to_string(),
            format!(
                "UserOperationEvent(requestId: {}, sender: {}, paymaster: none, nonce: 3, success: true, actualGasCost: 42000, actualGasPrice: 2)",
                B256::ZERO,
                Address::repeat_byte(0x11)
            )
        );

        event.paymaster = Some(Address::repeat_byte(0x44));
        assert!(event
            .to_string()
            .contains(&format!("paymaster: {},", Address::repeat_byte(0x44))));
    }
}
