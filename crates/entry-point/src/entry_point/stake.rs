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


//! Deposits and stakes the coordinator holds on behalf of accounts

use alloy_primitives::{Address, U256};
use settler_types::{CallError, DepositInfo, EntryPointError, EntryPointEvent};
use tracing::info;

use super::EntryPoint;

impl EntryPoint {
    /// Deposit and stake held for `account`
    pub fn deposit_info(&self, account: Address) -> DepositInfo {
        self.state.deposit_info(account)
    }

    /// Move `amount` from `from`'s balance into `account`'s deposit
    pub fn deposit_to(
        &mut self,
        from: Address,
        account: Address,
        amount: U256,
    ) -> Result<DepositInfo, EntryPointError> {
        self.pull(from, amount)?;
        let info = self.state.deposit_info_mut(account);
        info.deposit = info.deposit.saturating_add(amount);
        let info = *info;
        self.emit(EntryPointEvent::Deposited {
            account,
            total_deposit: info.deposit,
        });
        Ok(info)
    }

    /// Lock `amount` more of `account`'s balance as stake, with an unstake delay that
    /// may only grow. Locking cancels a pending unlock.
    pub fn add_stake(
        &mut self,
        account: Address,
        amount: U256,
        unstake_delay_sec: u64,
    ) -> Result<DepositInfo, EntryPointError> {
        let current = self.state.deposit_info(account);
        if unstake_delay_sec == 0 {
            return Err(refused(account, "must specify unstake delay"));
        }
        if unstake_delay_sec < current.unstake_delay_sec {
            return Err(refused(account, "cannot decrease unstake time"));
        }
        let stake = current.stake.saturating_add(amount);
        if stake.is_zero() {
            return Err(refused(account, "no stake specified"));
        }
        self.pull(account, amount)?;

        let info = self.state.deposit_info_mut(account);
        info.stake = stake;
        info.unstake_delay_sec = unstake_delay_sec;
        info.staked = true;
        info.withdraw_time = 0;
        let info = *info;
        info!("{account} staked {stake} with delay {unstake_delay_sec}s");
        self.emit(EntryPointEvent::StakeLocked {
            account,
            total_staked: stake,
            unstake_delay_sec,
        });
        Ok(info)
    }

    /// Start the unstake delay of `account`, returning the time the stake can be withdrawn
    pub fn unlock_stake(&mut self, account: Address) -> Result<u64, EntryPointError> {
        let now = self.block.timestamp;
        let info = self.state.deposit_info(account);
        if info.withdraw_time != 0 {
            return Err(refused(account, "already unstaking"));
        }
        if !info.staked {
            return Err(refused(account, "not staked"));
        }
        let withdraw_time = now.saturating_add(info.unstake_delay_sec);

        let info = self.state.deposit_info_mut(account);
        info.staked = false;
        info.withdraw_time = withdraw_time;
        self.emit(EntryPointEvent::StakeUnlocked {
            account,
            withdraw_time,
        });
        Ok(withdraw_time)
    }

    /// Pay out an unlocked stake once its delay has passed
    pub fn withdraw_stake(
        &mut self,
        account: Address,
        withdraw_address: Address,
    ) -> Result<U256, EntryPointError> {
        let now = self.block.timestamp;
        let info = self.state.deposit_info(account);
        if info.stake.is_zero() {
            return Err(refused(account, "no stake to withdraw"));
        }
        if info.withdraw_time == 0 {
            return Err(refused(account, "must call unlockStake() first"));
        }
        if info.withdraw_time > now {
            return Err(refused(account, "Stake withdrawal is not due"));
        }

        let amount = info.stake;
        self.push(withdraw_address, amount)?;
        let info = self.state.deposit_info_mut(account);
        info.stake = U256::ZERO;
        info.unstake_delay_sec = 0;
        info.withdraw_time = 0;
        self.emit(EntryPointEvent::StakeWithdrawn {
            account,
            withdraw_address,
            amount,
        });
        Ok(amount)
    }

    /// Pay `amount` of `account`'s deposit to `withdraw_address`
    pub fn withdraw_to(
        &mut self,
        account: Address,
        withdraw_address: Address,
        amount: U256,
    ) -> Result<(), EntryPointError> {
        let info = self.state.deposit_info(account);
        if amount > info.deposit {
            return Err(refused(account, "Withdraw amount too large"));
        }
        self.push(withdraw_address, amount)?;
        self.state.deposit_info_mut(account).deposit = info.deposit - amount;
        self.emit(EntryPointEvent::Withdrawn {
            account,
            withdraw_address,
            amount,
        });
        Ok(())
    }

    fn pull(&mut self, from: Address, amount: U256) -> Result<(), EntryPointError> {
        let entry_point = self.address();
        self.state
            .transfer(from, entry_point, amount)
            .map_err(|e| balance_error(from, e))
    }

    fn push(&mut self, to: Address, amount: U256) -> Result<(), EntryPointError> {
        let entry_point = self.address();
        self.state
            .transfer(entry_point, to, amount)
            .map_err(|e| balance_error(entry_point, e))
    }
}

fn refused(address: Address, reason: &str) -> EntryPointError {
    EntryPointError::StakeInsufficient {
        address,
        reason: reason.to_string(),
    }
}

fn balance_error(address: Address, error: CallError) -> EntryPointError {
    match error {
        CallError::InsufficientFunds {
            required,
            available,
        } => EntryPointError::InsufficientBalance {
            address,
            required,
            available,
        },
        error => EntryPointError::CallReverted {
            target: address,
            error,
        },
    }
}
