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

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolError;

use crate::contracts;

/// Failure raised inside a contract frame. Any of these rolls back every state change
/// the frame made.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CallError {
    /// The operation nonce does not match the wallet's stored nonce
    #[error("invalid nonce")]
    BadNonce {
        /// Nonce the wallet expected
        expected: U256,
        /// Nonce carried by the operation
        actual: U256,
    },
    /// The signature recovers to someone other than the wallet owner
    #[error("wallet: wrong signature")]
    BadSignature,
    /// The signature bytes do not form a recoverable signature
    #[error("wallet: invalid signature: {0}")]
    InvalidSignature(String),
    /// A balance cannot cover a transfer
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the transfer needed
        required: U256,
        /// Balance held at the time
        available: U256,
    },
    /// The frame ran past its gas limit
    #[error("out of gas")]
    OutOfGas,
    /// The frame is not allowed to be called by this caller
    #[error("{0}")]
    Unauthorized(String),
    /// The call data did not decode to a known method
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    /// Any other revert, carrying its reason string
    #[error("{0}")]
    Revert(String),
}

/// Why the coordinator refused an operation during validation.
///
/// Each reason carries the `AAxx` code it is reported under.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RejectionKind {
    /// Init code was supplied for an account that already exists
    #[error("AA10 sender already constructed")]
    SenderAlreadyConstructed,
    /// The factory frame failed
    #[error("AA13 initCode failed or OOG: {0}")]
    InitCodeFailed(CallError),
    /// The factory deployed a different address than the operation's sender
    #[error("AA14 initCode must return sender")]
    InitCodeReturnedWrongSender(Address),
    /// The init code does not name a deployed factory
    #[error("AA13 initCode failed or OOG: factory {0} not deployed")]
    FactoryNotDeployed(Address),
    /// The sender has no account code and no init code
    #[error("AA20 account not deployed")]
    AccountNotDeployed,
    /// The account returned without transferring its prefund
    #[error("AA21 didn't pay prefund")]
    PrefundNotPaid {
        /// Prefund the coordinator needed
        required: U256,
        /// Amount actually received
        paid: U256,
    },
    /// The account's validation frame failed
    #[error("AA23 reverted: {0}")]
    AccountReverted(CallError),
    /// The named paymaster has no paymaster code
    #[error("AA30 paymaster not deployed")]
    PaymasterNotDeployed,
    /// The paymaster's deposit cannot cover the prefund
    #[error("AA31 paymaster deposit too low")]
    PaymasterDepositTooLow {
        /// Prefund the coordinator needed
        required: U256,
        /// Deposit available
        deposit: U256,
    },
    /// The paymaster is unstaked, or its stake or unstake delay is under the minimum
    #[error("AA32 paymaster stake too low")]
    PaymasterStakeTooLow {
        /// Current stake
        stake: U256,
        /// Current unstake delay
        unstake_delay_sec: u64,
    },
    /// The paymaster's validation frame failed
    #[error("AA33 reverted: {0}")]
    PaymasterReverted(CallError),
    /// A gas limit or fee does not fit in 128 bits
    #[error("AA94 gas values overflow")]
    GasValuesOverflow,
}

impl RejectionKind {
    /// The `AAxx` code of this rejection
    pub fn code(&self) -> &'static str {
        match self {
            RejectionKind::SenderAlreadyConstructed => "AA10",
            RejectionKind::InitCodeFailed(_) | RejectionKind::FactoryNotDeployed(_) => "AA13",
            RejectionKind::InitCodeReturnedWrongSender(_) => "AA14",
            RejectionKind::AccountNotDeployed => "AA20",
            RejectionKind::PrefundNotPaid { .. } => "AA21",
            RejectionKind::AccountReverted(_) => "AA23",
            RejectionKind::PaymasterNotDeployed => "AA30",
            RejectionKind::PaymasterDepositTooLow { .. } => "AA31",
            RejectionKind::PaymasterStakeTooLow { .. } => "AA32",
            RejectionKind::PaymasterReverted(_) => "AA33",
            RejectionKind::GasValuesOverflow => "AA94",
        }
    }

    /// Whether the rejection is a sponsor lacking deposit or stake
    pub fn is_stake_insufficient(&self) -> bool {
        matches!(
            self,
            RejectionKind::PaymasterDepositTooLow { .. }
                | RejectionKind::PaymasterStakeTooLow { .. }
        )
    }

    /// Whether the request itself was malformed rather than refused by an entity
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            RejectionKind::GasValuesOverflow
                | RejectionKind::AccountReverted(CallError::InvalidSignature(_))
        )
    }
}

/// An operation of a batch failed validation, so the whole batch was refused
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error(
    "FailedOp({op_index}, {}, {kind})",
    .paymaster.map_or_else(|| "none".to_string(), |p| p.to_string())
)]
pub struct FailedOp {
    /// Position of the failing operation in the batch
    pub op_index: usize,
    /// Paymaster of the failing operation, if any
    pub paymaster: Option<Address>,
    /// Why the operation was refused
    pub kind: RejectionKind,
}

impl FailedOp {
    /// Reason string, as reported in the revert payload
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }

    /// The ABI-encoded `FailedOp(uint256,address,string)` revert payload
    pub fn abi_encode(&self) -> Bytes {
        contracts::FailedOp {
            opIndex: U256::from(self.op_index),
            paymaster: self.paymaster.unwrap_or_default(),
            reason: self.reason(),
        }
        .abi_encode()
        .into()
    }
}

/// Errors returned by the coordinator
#[derive(Debug, thiserror::Error)]
pub enum EntryPointError {
    /// An operation of the batch was refused during validation
    #[error("{0}")]
    FailedOp(#[from] FailedOp),
    /// A stake manager request was refused
    #[error("{address}: {reason}")]
    StakeInsufficient {
        /// Account whose stake or deposit was insufficient
        address: Address,
        /// What was missing
        reason: String,
    },
    /// A transfer out of an account's balance could not be covered
    #[error("insufficient balance for {address}: required {required}, available {available}")]
    InsufficientBalance {
        /// Account being debited
        address: Address,
        /// Amount requested
        required: U256,
        /// Balance held
        available: U256,
    },
    /// A direct call reverted
    #[error("call to {target} reverted: {error}")]
    CallReverted {
        /// Contract that was called
        target: Address,
        /// Why it reverted
        error: CallError,
    },
    /// Other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EntryPointError {
    /// Whether this is a validation rejection caused by a malformed request
    pub fn is_malformed_request(&self) -> bool {
        matches!(self, EntryPointError::FailedOp(op) if op.kind.is_malformed())
    }

    /// Whether this is a shortfall of a paymaster's or staker's funds
    pub fn is_stake_insufficient(&self) -> bool {
        match self {
            EntryPointError::FailedOp(op) => op.kind.is_stake_insufficient(),
            EntryPointError::StakeInsufficient { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    #[test]
    fn failed_op_display() {
        let err = FailedOp {
            op_index: 0,
            paymaster: None,
            kind: RejectionKind::AccountReverted(CallError::BadNonce {
                expected: U256::from(1),
                actual: U256::ZERO,
            }),
        };
        assert_eq!(err.to_string(), "FailedOp(0, none, AA23 reverted: invalid nonce)");

        let paymaster = address!("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        let err = FailedOp {
            op_index: 2,
            paymaster: Some(paymaster),
            kind: RejectionKind::PaymasterDepositTooLow {
                required: U256::from(10),
                deposit: U256::from(1),
            },
        };
        assert_eq!(
            err.to_string(),
            "FailedOp(2, 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed, AA31 paymaster deposit too low)"
        );
    }

    #[test]
    fn failed_op_abi_payload() {
        let err = FailedOp {
            op_index: 1,
            paymaster: None,
            kind: RejectionKind::AccountNotDeployed,
        };
        let encoded = err.abi_encode();
        assert_eq!(&encoded[..4], &[0x00, 0xfa, 0x07, 0x2b]);
        let decoded = contracts::FailedOp::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.opIndex, U256::from(1));
        assert_eq!(decoded.paymaster, Address::ZERO);
        assert_eq!(decoded.reason, "AA20 account not deployed");
    }

    #[test]
    fn error_categories() {
        let stake = EntryPointError::FailedOp(FailedOp {
            op_index: 0,
            paymaster: Some(Address::ZERO),
            kind: RejectionKind::PaymasterStakeTooLow {
                stake: U256::ZERO,
                unstake_delay_sec: 0,
            },
        });
        assert!(stake.is_stake_insufficient());
        assert!(!stake.is_malformed_request());

        let malformed = EntryPointError::FailedOp(FailedOp {
            op_index: 0,
            paymaster: None,
            kind: RejectionKind::AccountReverted(CallError::InvalidSignature(
                "wrong length".into(),
            )),
        });
        assert!(malformed.is_malformed_request());
        assert_eq!(
            RejectionKind::GasValuesOverflow.code(),
            "AA94"
        );
    }
}
