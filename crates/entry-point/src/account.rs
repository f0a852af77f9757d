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


use std::fmt::Debug;

use alloy_primitives::{Address, Bytes, B256, U256};
use settler_types::{CallError, PostOpMode, UserOperation};

use crate::{context::CallContext, state::Storage};

/// A smart-contract wallet the coordinator validates and executes operations on.
///
/// Every method runs inside a frame: an `Err` rolls back everything the frame did.
pub trait Account: Debug + Send + Sync + 'static {
    /// Approve `op` for execution.
    ///
    /// Called by the coordinator with the request id the owner should have signed. The
    /// account must transfer `required_prefund` to its caller before returning; a zero
    /// prefund means a paymaster is paying.
    fn validate_user_op(
        &self,
        ctx: &mut CallContext<'_>,
        op: &UserOperation,
        request_id: B256,
        required_prefund: U256,
    ) -> Result<(), CallError>;

    /// Run `call_data` against the account
    fn execute(&self, ctx: &mut CallContext<'_>, call_data: &[u8]) -> Result<(), CallError>;

    /// The nonce the next operation must carry
    fn nonce(&self, storage: &Storage) -> U256;
}

/// A sponsor that pays for operations out of its coordinator deposit
pub trait Paymaster: Debug + Send + Sync + 'static {
    /// Agree to pay up to `max_cost` for `op`, returning a context for [`Paymaster::post_op`]
    fn validate_paymaster_user_op(
        &self,
        ctx: &mut CallContext<'_>,
        op: &UserOperation,
        request_id: B256,
        max_cost: U256,
    ) -> Result<Bytes, CallError>;

    /// Called after execution when validation returned a non-empty context
    fn post_op(
        &self,
        _ctx: &mut CallContext<'_>,
        _mode: PostOpMode,
        _context: &Bytes,
        _actual_gas_cost: U256,
    ) -> Result<(), CallError> {
        Ok(())
    }
}

/// Deploys accounts from an operation's init code
pub trait AccountFactory: Debug + Send + Sync + 'static {
    /// Deploy an account from `init_data`, returning its address
    fn create_account(
        &self,
        ctx: &mut CallContext<'_>,
        init_data: &[u8],
    ) -> Result<Address, CallError>;
}
