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


use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, B256, U256};
use settler_types::{CallError, DepositInfo};

use crate::account::{Account, AccountFactory, Paymaster};

/// Storage slots of one address
pub type Storage = HashMap<B256, U256>;

/// Behavior deployed at an address
#[derive(Clone, Debug)]
pub enum Code {
    /// A wallet
    Account(Arc<dyn Account>),
    /// A sponsor
    Paymaster(Arc<dyn Paymaster>),
    /// An account deployer
    Factory(Arc<dyn AccountFactory>),
}

#[derive(Clone, Debug, Default)]
struct AccountRecord {
    balance: U256,
    code: Option<Code>,
    storage: Storage,
}

/// The whole ledger: balances, deployed code, storage and the coordinator's deposits.
///
/// Cloning takes a snapshot; restoring a clone rolls every change back.
#[derive(Clone, Debug, Default)]
pub struct WorldState {
    accounts: HashMap<Address, AccountRecord>,
    deposits: HashMap<Address, DepositInfo>,
}

impl WorldState {
    /// Native balance of `address`
    pub fn balance(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    /// Create `amount` out of thin air at `address`
    pub fn mint(&mut self, address: Address, amount: U256) {
        let record = self.accounts.entry(address).or_default();
        record.balance = record.balance.saturating_add(amount);
    }

    /// Move `amount` between two balances
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), CallError> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.balance(from);
        if available < amount {
            return Err(CallError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.accounts.entry(from).or_default().balance = available - amount;
        self.mint(to, amount);
        Ok(())
    }

    /// Code deployed at `address`
    pub fn code(&self, address: Address) -> Option<&Code> {
        self.accounts.get(&address).and_then(|a| a.code.as_ref())
    }

    /// Whether anything is deployed at `address`
    pub fn has_code(&self, address: Address) -> bool {
        self.code(address).is_some()
    }

    /// Deploy `code` at `address`, replacing whatever was there
    pub fn set_code(&mut self, address: Address, code: Code) {
        self.accounts.entry(address).or_default().code = Some(code);
    }

    /// All storage of `address`
    pub fn storage(&self, address: Address) -> Option<&Storage> {
        self.accounts.get(&address).map(|a| &a.storage)
    }

    /// Read a storage slot, zero when unset
    pub fn sload(&self, address: Address, slot: B256) -> U256 {
        self.storage(address)
            .and_then(|s| s.get(&slot).copied())
            .unwrap_or_default()
    }

    /// Write a storage slot
    pub fn sstore(&mut self, address: Address, slot: B256, value: U256) {
        self.accounts
            .entry(address)
            .or_default()
            .storage
            .insert(slot, value);
    }

    /// Deposit and stake the coordinator holds for `address`
    pub fn deposit_info(&self, address: Address) -> DepositInfo {
        self.deposits.get(&address).copied().unwrap_or_default()
    }

    pub(crate) fn deposit_info_mut(&mut self, address: Address) -> &mut DepositInfo {
        self.deposits.entry(address).or_default()
    }
}
