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


//! A single-owner wallet and its deterministic factory

use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{SolCall, SolInterface, SolValue};
use settler_types::{
    contracts::{
        ISimpleWallet::{self, ISimpleWalletCalls},
        ISimpleWalletFactory,
    },
    CallError, UserOperation,
};
use tracing::debug;

use crate::{
    account::{Account, AccountFactory},
    context::CallContext,
    state::Storage,
};

const NONCE_SLOT: B256 = B256::ZERO;

/// A wallet owned by one signing key.
///
/// Operations must carry the owner's signature over their request id. Only the
/// coordinator may validate operations; the owner may also call the wallet directly.
#[derive(Clone, Debug)]
pub struct SimpleWallet {
    entry_point: Address,
    owner: Address,
}

impl SimpleWallet {
    /// A wallet trusting `entry_point` and owned by `owner`
    pub fn new(entry_point: Address, owner: Address) -> Self {
        Self { entry_point, owner }
    }

    /// The owning key's address
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Call data of `transfer(dest, amount)`
    pub fn transfer_call(dest: Address, amount: U256) -> Vec<u8> {
        ISimpleWallet::transferCall { dest, amount }.abi_encode()
    }

    /// Call data of `exec(dest, value, func)`
    pub fn exec_call(dest: Address, value: U256, func: Vec<u8>) -> Vec<u8> {
        ISimpleWallet::execCall {
            dest,
            value,
            func: func.into(),
        }
        .abi_encode()
    }

    fn require_owner_or_entry_point(&self, ctx: &CallContext<'_>) -> Result<(), CallError> {
        let caller = ctx.caller();
        if caller == self.owner || caller == self.entry_point || caller == ctx.address() {
            Ok(())
        } else {
            Err(CallError::Unauthorized("only owner".to_string()))
        }
    }
}

impl Account for SimpleWallet {
    fn validate_user_op(
        &self,
        ctx: &mut CallContext<'_>,
        op: &UserOperation,
        request_id: B256,
        required_prefund: U256,
    ) -> Result<(), CallError> {
        if ctx.caller() != self.entry_point {
            return Err(CallError::Unauthorized(
                "wallet: not from EntryPoint".to_string(),
            ));
        }

        let nonce = ctx.sload(NONCE_SLOT)?;
        if op.nonce != nonce {
            return Err(CallError::BadNonce {
                expected: nonce,
                actual: op.nonce,
            });
        }

        if ctx.ecrecover(request_id, &op.signature)? != self.owner {
            return Err(CallError::BadSignature);
        }

        ctx.sstore(NONCE_SLOT, nonce + U256::from(1))?;

        if !required_prefund.is_zero() {
            ctx.transfer(ctx.caller(), required_prefund)?;
        }
        debug!(
            "wallet {} validated nonce {nonce}, paid {required_prefund}",
            ctx.address()
        );
        Ok(())
    }

    fn execute(&self, ctx: &mut CallContext<'_>, call_data: &[u8]) -> Result<(), CallError> {
        self.require_owner_or_entry_point(ctx)?;
        let call = ISimpleWalletCalls::abi_decode(call_data)
            .map_err(|e| CallError::UnknownMethod(e.to_string()))?;
        match call {
            ISimpleWalletCalls::transfer(call) => ctx.transfer(call.dest, call.amount),
            ISimpleWalletCalls::exec(call) => ctx.call(call.dest, call.value, &call.func),
            ISimpleWalletCalls::execBatch(call) => {
                if call.dest.len() != call.func.len() {
                    return Err(CallError::Revert("wrong array lengths".to_string()));
                }
                for (dest, func) in call.dest.iter().zip(&call.func) {
                    ctx.call(*dest, U256::ZERO, func)?;
                }
                Ok(())
            }
        }
    }

    fn nonce(&self, storage: &Storage) -> U256 {
        storage.get(&NONCE_SLOT).copied().unwrap_or_default()
    }
}

/// Deploys [`SimpleWallet`]s at addresses derived from the owner and a salt, so an
/// operation can name its sender before the wallet exists.
#[derive(Clone, Debug)]
pub struct SimpleWalletFactory {
    entry_point: Address,
}

impl SimpleWalletFactory {
    /// A factory whose wallets trust `entry_point`
    pub fn new(entry_point: Address) -> Self {
        Self { entry_point }
    }

    /// Address the factory at `factory` deploys the wallet of `(owner, salt)` to
    pub fn wallet_address(
        &self,
        factory: Address,
        owner: Address,
        salt: U256,
    ) -> Address {
        let init_code_hash = keccak256((self.entry_point, owner).abi_encode());
        factory.create2(salt.to_be_bytes::<32>(), init_code_hash.0)
    }

    /// Init code deploying the wallet of `(owner, salt)` through the factory at `factory`
    pub fn init_code(factory: Address, owner: Address, salt: U256) -> Vec<u8> {
        let mut init_code = factory.to_vec();
        init_code
            .extend(ISimpleWalletFactory::createAccountCall { owner, salt }.abi_encode());
        init_code
    }
}

impl AccountFactory for SimpleWalletFactory {
    fn create_account(
        &self,
        ctx: &mut CallContext<'_>,
        init_data: &[u8],
    ) -> Result<Address, CallError> {
        let call = ISimpleWalletFactory::createAccountCall::abi_decode(init_data)
            .map_err(|e| CallError::UnknownMethod(e.to_string()))?;
        let address = self.wallet_address(ctx.address(), call.owner, call.salt);
        ctx.deploy_account(
            address,
            Arc::new(SimpleWallet::new(self.entry_point, call.owner)),
        )?;
        Ok(address)
    }
}
