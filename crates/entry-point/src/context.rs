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

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use settler_types::{CallError, Opcode, TraceStep, ValidationTrace};

use crate::{
    account::Account,
    gas::{GasMeter, GasSchedule},
    state::{Code, WorldState},
};

/// Block the coordinator executes in
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockEnv {
    /// Block number
    pub number: u64,
    /// Block timestamp in seconds
    pub timestamp: u64,
    /// Block base fee
    pub base_fee: U256,
}

/// Everything a frame can observe about its surroundings
#[derive(Clone, Debug)]
pub(crate) struct ExecutionEnv {
    pub(crate) block: BlockEnv,
    pub(crate) gas_price: U256,
    pub(crate) schedule: GasSchedule,
}

/// Collects the instructions of a run when tracing is on
#[derive(Debug, Default)]
pub(crate) struct TraceRecorder {
    steps: Option<Vec<TraceStep>>,
}

impl TraceRecorder {
    pub(crate) fn enabled() -> Self {
        Self {
            steps: Some(vec![]),
        }
    }

    pub(crate) fn disabled() -> Self {
        Self { steps: None }
    }

    pub(crate) fn record(&mut self, op: Opcode, depth: u64) {
        if let Some(steps) = &mut self.steps {
            steps.push(TraceStep::new(op, depth));
        }
    }

    pub(crate) fn finish(self) -> ValidationTrace {
        self.steps.unwrap_or_default().into()
    }
}

/// The view a contract frame has of the ledger.
///
/// Environment reads, storage access and calls are charged against the frame's gas
/// meter and recorded as the instruction a compiled contract would execute.
#[derive(Debug)]
pub struct CallContext<'a> {
    state: &'a mut WorldState,
    env: &'a ExecutionEnv,
    recorder: &'a mut TraceRecorder,
    meter: &'a mut GasMeter,
    caller: Address,
    address: Address,
    depth: u64,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        state: &'a mut WorldState,
        env: &'a ExecutionEnv,
        recorder: &'a mut TraceRecorder,
        meter: &'a mut GasMeter,
        caller: Address,
        address: Address,
        depth: u64,
    ) -> Self {
        Self {
            state,
            env,
            recorder,
            meter,
            caller,
            address,
            depth,
        }
    }

    /// Address that called this frame
    pub fn caller(&self) -> Address {
        self.caller
    }

    /// Address this frame runs as
    pub fn address(&self) -> Address {
        self.address
    }

    /// Call depth of this frame
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Remaining gas of the frame
    pub fn gas_left(&mut self) -> Result<u64, CallError> {
        self.env_read(Opcode::GAS)?;
        Ok(self.meter.remaining())
    }

    /// Effective gas price of the running operation
    pub fn gas_price(&mut self) -> Result<U256, CallError> {
        self.env_read(Opcode::GASPRICE)?;
        Ok(self.env.gas_price)
    }

    /// Base fee of the current block
    pub fn base_fee(&mut self) -> Result<U256, CallError> {
        self.env_read(Opcode::BASEFEE)?;
        Ok(self.env.block.base_fee)
    }

    /// Current block number
    pub fn block_number(&mut self) -> Result<u64, CallError> {
        self.env_read(Opcode::NUMBER)?;
        Ok(self.env.block.number)
    }

    /// Current block timestamp
    pub fn timestamp(&mut self) -> Result<u64, CallError> {
        self.env_read(Opcode::TIMESTAMP)?;
        Ok(self.env.block.timestamp)
    }

    /// Balance of this frame's address
    pub fn self_balance(&mut self) -> Result<U256, CallError> {
        self.env_read(Opcode::SELFBALANCE)?;
        Ok(self.state.balance(self.address))
    }

    /// Read one of this frame's storage slots
    pub fn sload(&mut self, slot: B256) -> Result<U256, CallError> {
        self.step(Opcode::SLOAD, self.env.schedule.sload)?;
        Ok(self.state.sload(self.address, slot))
    }

    /// Write one of this frame's storage slots
    pub fn sstore(&mut self, slot: B256, value: U256) -> Result<(), CallError> {
        self.step(Opcode::SSTORE, self.env.schedule.sstore)?;
        self.state.sstore(self.address, slot, value);
        Ok(())
    }

    /// Recover the signer of `request_id` through the ecrecover precompile
    pub fn ecrecover(&mut self, request_id: B256, signature: &[u8]) -> Result<Address, CallError> {
        self.record(Opcode::GAS);
        self.step(Opcode::STATICCALL, self.env.schedule.ecrecover)?;
        settler_signer::recover_signer(request_id, signature)
            .map_err(|e| CallError::InvalidSignature(e.to_string()))
    }

    /// Send `amount` from this frame's balance without running the recipient's code
    pub fn transfer(&mut self, to: Address, amount: U256) -> Result<(), CallError> {
        self.record(Opcode::GAS);
        self.step(Opcode::CALL, self.value_cost(amount))?;
        self.state.transfer(self.address, to, amount)
    }

    /// Call `to` with `value` and `data`. Wallets run `data` through
    /// [`Account::execute`]; any other address just receives the value.
    pub fn call(&mut self, to: Address, value: U256, data: &[u8]) -> Result<(), CallError> {
        self.charge(self.value_cost(value))?;
        let target = match self.state.code(to) {
            Some(Code::Account(account)) if !data.is_empty() => Some(Arc::clone(account)),
            _ => None,
        };
        self.invoke(to, |ctx| {
            ctx.state.transfer(ctx.caller, ctx.address, value)?;
            match target {
                Some(account) => account.execute(ctx, data),
                None => Ok(()),
            }
        })
    }

    /// Deploy `account` at `address` on behalf of this frame
    pub fn deploy_account(
        &mut self,
        address: Address,
        account: Arc<dyn Account>,
    ) -> Result<(), CallError> {
        self.step(Opcode::CREATE2, self.env.schedule.create_account)?;
        if self.state.has_code(address) {
            return Err(CallError::Revert(format!("{address} already deployed")));
        }
        self.state.set_code(address, Code::Account(account));
        Ok(())
    }

    /// Run `body` in a child frame at `target`, called by this frame.
    ///
    /// The child shares this frame's gas meter. If it fails, every ledger change it made
    /// is discarded before the error is returned.
    pub(crate) fn invoke<T>(
        &mut self,
        target: Address,
        body: impl FnOnce(&mut CallContext<'_>) -> Result<T, CallError>,
    ) -> Result<T, CallError> {
        self.record(Opcode::GAS);
        self.step(Opcode::CALL, self.env.schedule.call)?;
        let checkpoint = self.state.clone();
        let depth = self.depth + 1;
        let result = body(&mut CallContext {
            state: &mut *self.state,
            env: self.env,
            recorder: &mut *self.recorder,
            meter: &mut *self.meter,
            caller: self.address,
            address: target,
            depth,
        });
        match result {
            Ok(value) => {
                self.recorder.record(Opcode::POP, depth);
                self.recorder.record(Opcode::RETURN, depth);
                Ok(value)
            }
            Err(error) => {
                *self.state = checkpoint;
                self.recorder.record(Opcode::REVERT, depth);
                Err(error)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &WorldState {
        self.state
    }

    fn value_cost(&self, value: U256) -> u64 {
        if value.is_zero() {
            0
        } else {
            self.env.schedule.value_transfer
        }
    }

    fn env_read(&mut self, op: Opcode) -> Result<(), CallError> {
        self.step(op, self.env.schedule.env_read)
    }

    fn step(&mut self, op: Opcode, cost: u64) -> Result<(), CallError> {
        self.record(op);
        self.charge(cost)
    }

    fn record(&mut self, op: Opcode) {
        self.recorder.record(op, self.depth);
    }

    fn charge(&mut self, amount: u64) -> Result<(), CallError> {
        self.meter.charge(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> ExecutionEnv {
        ExecutionEnv {
            block: BlockEnv {
                number: 7,
                timestamp: 1_000,
                base_fee: U256::from(10),
            },
            gas_price: U256::from(12),
            schedule: GasSchedule::default(),
        }
    }

    #[test]
    fn environment_reads_are_recorded_at_frame_depth() {
        let env = env();
        let mut state = WorldState::default();
        let mut recorder = TraceRecorder::enabled();
        let mut meter = GasMeter::unmetered();
        let mut ctx = CallContext::new(
            &mut state,
            &env,
            &mut recorder,
            &mut meter,
            Address::ZERO,
            Address::repeat_byte(1),
            2,
        );
        assert_eq!(ctx.block_number().unwrap(), 7);
        assert_eq!(ctx.gas_price().unwrap(), U256::from(12));
        assert_eq!(ctx.base_fee().unwrap(), U256::from(10));

        let trace = recorder.finish();
        let ops: Vec<_> = trace.iter().map(|s| (s.op, s.depth)).collect();
        assert_eq!(
            ops,
            vec![
                (Opcode::NUMBER, 2),
                (Opcode::GASPRICE, 2),
                (Opcode::BASEFEE, 2)
            ]
        );
    }

    #[test]
    fn failed_child_frame_rolls_back() {
        let env = env();
        let (parent, child) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let mut state = WorldState::default();
        state.mint(parent, U256::from(100));
        let mut recorder = TraceRecorder::enabled();
        let mut meter = GasMeter::unmetered();
        let mut ctx = CallContext::new(
            &mut state,
            &env,
            &mut recorder,
            &mut meter,
            Address::ZERO,
            parent,
            1,
        );
        let result: Result<(), CallError> = ctx.invoke(child, |inner| {
            inner.sstore(B256::ZERO, U256::from(1))?;
            Err(CallError::Revert("nope".into()))
        });
        assert_eq!(result, Err(CallError::Revert("nope".into())));
        assert_eq!(ctx.state().sload(child, B256::ZERO), U256::ZERO);

        let trace = recorder.finish();
        let ops: Vec<_> = trace.iter().map(|s| (s.op, s.depth)).collect();
        assert_eq!(
            ops,
            vec![
                (Opcode::GAS, 1),
                (Opcode::CALL, 1),
                (Opcode::SSTORE, 2),
                (Opcode::REVERT, 2)
            ]
        );
    }

    #[test]
    fn out_of_gas_fails_the_frame() {
        let env = env();
        let mut state = WorldState::default();
        let mut recorder = TraceRecorder::disabled();
        let mut meter = GasMeter::new(1_000);
        let mut ctx = CallContext::new(
            &mut state,
            &env,
            &mut recorder,
            &mut meter,
            Address::ZERO,
            Address::repeat_byte(1),
            2,
        );
        assert_eq!(ctx.sload(B256::ZERO), Err(CallError::OutOfGas));
        assert!(recorder.finish().is_empty());
    }

    #[test]
    fn call_moves_value_to_plain_address() {
        let env = env();
        let (from, to) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let mut state = WorldState::default();
        state.mint(from, U256::from(50));
        let mut recorder = TraceRecorder::disabled();
        let mut meter = GasMeter::unmetered();
        let mut ctx = CallContext::new(
            &mut state, &env, &mut recorder, &mut meter, Address::ZERO, from, 1,
        );
        ctx.call(to, U256::from(20), &[0xde, 0xad]).unwrap();
        assert_eq!(state.balance(from), U256::from(30));
        assert_eq!(state.balance(to), U256::from(20));
        assert_eq!(
            meter.used(),
            GasSchedule::default().value_transfer + GasSchedule::default().call
        );
    }
}
