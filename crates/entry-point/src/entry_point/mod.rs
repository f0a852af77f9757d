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

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::anyhow;
use settler_types::{
    CallError, EntryPointError, EntryPointEvent, FailedOp, PostOpMode, RejectionKind,
    UserOperation, UserOperationEvent, UserOperationRevertReason, ValidationOutput,
    ValidationTrace,
};
use settler_utils::emit::{EventEmitter, WithEntryPoint};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    account::{Account, AccountFactory, Paymaster},
    context::{BlockEnv, CallContext, ExecutionEnv, TraceRecorder},
    gas::GasMeter,
    settings::EntryPointSettings,
    state::{Code, Storage, WorldState},
};

mod stake;

/// How one operation of a batch settled
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpOutcome {
    /// Request id of the operation
    pub request_id: B256,
    /// Wallet that executed it
    pub sender: Address,
    /// Nonce the operation consumed
    pub nonce: U256,
    /// Whether execution completed
    pub success: bool,
    /// Gas charged: pre-verification, validation, execution and post-op
    pub actual_gas_used: U256,
    /// Fee charged to the payer
    pub actual_gas_cost: U256,
    /// Effective gas price
    pub actual_gas_price: U256,
    /// Why execution failed, if it did
    pub revert_reason: Option<String>,
}

/// Validation of one operation run against a snapshot of the ledger
#[derive(Clone, Debug)]
pub struct SimulatedValidation {
    /// Request id of the operation
    pub request_id: B256,
    /// What validation would have collected
    pub output: ValidationOutput,
    /// Every instruction the validation frames executed
    pub trace: ValidationTrace,
}

#[derive(Debug)]
struct ValidatedOp {
    request_id: B256,
    output: ValidationOutput,
    factory: Option<Address>,
}

/// The coordinator: validates operations, executes them on their wallets and settles
/// their fees from prefunds, on top of an in-memory ledger it owns.
#[derive(Debug)]
pub struct EntryPoint {
    settings: EntryPointSettings,
    state: WorldState,
    block: BlockEnv,
    logs: Vec<EntryPointEvent>,
    emitter: EventEmitter<EntryPointEvent>,
}

impl EntryPoint {
    /// A coordinator with an empty ledger
    pub fn new(settings: EntryPointSettings) -> Self {
        Self {
            emitter: EventEmitter::new(settings.address),
            settings,
            state: WorldState::default(),
            block: BlockEnv::default(),
            logs: vec![],
        }
    }

    /// Address of the coordinator
    pub fn address(&self) -> Address {
        self.settings.address
    }

    /// Chain id the coordinator signs for
    pub fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    /// Deployment parameters
    pub fn settings(&self) -> &EntryPointSettings {
        &self.settings
    }

    /// Request id of `op` for this deployment
    pub fn request_id(&self, op: &UserOperation) -> B256 {
        op.request_id(self.address(), self.chain_id())
    }

    /// The block operations run in
    pub fn block(&self) -> BlockEnv {
        self.block
    }

    /// Move to another block
    pub fn set_block(&mut self, block: BlockEnv) {
        self.block = block;
    }

    /// Advance to the next block, `seconds` later
    pub fn advance_time(&mut self, seconds: u64) {
        self.block.number += 1;
        self.block.timestamp += seconds;
    }

    /// Read-only view of the ledger
    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Native balance of `address`
    pub fn balance(&self, address: Address) -> U256 {
        self.state.balance(address)
    }

    /// Credit `amount` to `address` from outside the ledger
    pub fn fund(&mut self, address: Address, amount: U256) {
        self.state.mint(address, amount);
    }

    /// Deploy a wallet at `address`
    pub fn deploy_account(&mut self, address: Address, account: impl Account) {
        self.state
            .set_code(address, Code::Account(Arc::new(account)));
    }

    /// Deploy a paymaster at `address`
    pub fn deploy_paymaster(&mut self, address: Address, paymaster: impl Paymaster) {
        self.state
            .set_code(address, Code::Paymaster(Arc::new(paymaster)));
    }

    /// Deploy an account factory at `address`
    pub fn deploy_factory(&mut self, address: Address, factory: impl AccountFactory) {
        self.state
            .set_code(address, Code::Factory(Arc::new(factory)));
    }

    /// Current nonce of the wallet at `sender`, if one is deployed
    pub fn nonce(&self, sender: Address) -> Option<U256> {
        let Some(Code::Account(account)) = self.state.code(sender) else {
            return None;
        };
        let empty = Storage::default();
        Some(account.nonce(self.state.storage(sender).unwrap_or(&empty)))
    }

    /// Every event emitted so far, oldest first
    pub fn logs(&self) -> &[EntryPointEvent] {
        &self.logs
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<WithEntryPoint<EntryPointEvent>> {
        self.emitter.subscribe()
    }

    /// Validate, execute and settle a single operation
    pub fn handle_op(
        &mut self,
        op: &UserOperation,
        beneficiary: Address,
    ) -> Result<OpOutcome, EntryPointError> {
        self.handle_ops(std::slice::from_ref(op), beneficiary)?
            .pop()
            .ok_or_else(|| anyhow!("batch of one settled no operation").into())
    }

    /// Validate every operation, then execute and settle each in order, paying the
    /// collected fees to `beneficiary`.
    ///
    /// Any validation failure rejects the whole batch without touching the ledger. An
    /// execution failure only rolls back that operation's call; its nonce and fee stand.
    pub fn handle_ops(
        &mut self,
        ops: &[UserOperation],
        beneficiary: Address,
    ) -> Result<Vec<OpOutcome>, EntryPointError> {
        let mut state = self.state.clone();
        let mut recorder = TraceRecorder::disabled();
        let mut events = vec![];

        let mut validated = Vec::with_capacity(ops.len());
        for (op_index, op) in ops.iter().enumerate() {
            let op_validated = self
                .validate_prepayment(&mut state, op_index, op, &mut recorder)
                .inspect_err(|e| warn!("Rejected batch of {} ops: {e}", ops.len()))?;
            if let Some(factory) = op_validated.factory {
                events.push(EntryPointEvent::AccountDeployed {
                    request_id: op_validated.request_id,
                    sender: op.sender,
                    factory,
                });
            }
            validated.push(op_validated);
        }

        let mut outcomes = Vec::with_capacity(ops.len());
        let mut collected = U256::ZERO;
        for (op, op_validated) in ops.iter().zip(&validated) {
            let outcome = self.execute_user_op(&mut state, op, op_validated, &mut events)?;
            collected += outcome.actual_gas_cost;
            outcomes.push(outcome);
        }
        state
            .transfer(self.address(), beneficiary, collected)
            .map_err(|e| anyhow!("compensating beneficiary {beneficiary} failed: {e}"))?;

        self.commit(state, events);
        Ok(outcomes)
    }

    /// Run validation of `op` against a snapshot of the ledger, recording every
    /// instruction it executes. The ledger is never modified.
    pub fn simulate_validation(
        &self,
        op: &UserOperation,
    ) -> Result<SimulatedValidation, EntryPointError> {
        let mut state = self.state.clone();
        let mut recorder = TraceRecorder::enabled();
        let validated = self.validate_prepayment(&mut state, 0, op, &mut recorder)?;
        Ok(SimulatedValidation {
            request_id: validated.request_id,
            output: validated.output,
            trace: recorder.finish(),
        })
    }

    /// Send a plain transaction from `from` to `to`, returning the gas it used
    pub fn call(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
        call_data: &[u8],
    ) -> Result<u64, EntryPointError> {
        self.require_external_caller(from, to)?;
        let mut state = self.state.clone();
        let env = self.env(self.block.base_fee);
        let mut recorder = TraceRecorder::disabled();
        let mut meter = GasMeter::new(self.settings.call_gas_limit);
        CallContext::new(&mut state, &env, &mut recorder, &mut meter, from, from, 0)
            .call(to, value, call_data)
            .map_err(|error| EntryPointError::CallReverted { target: to, error })?;
        self.state = state;
        Ok(meter.used())
    }

    /// Call a wallet's validation entry directly from `from`, as an externally owned
    /// caller would. The wallet pays `required_prefund` to `from`.
    pub fn call_validate_user_op(
        &mut self,
        from: Address,
        op: &UserOperation,
        request_id: B256,
        required_prefund: U256,
    ) -> Result<u64, EntryPointError> {
        self.require_external_caller(from, op.sender)?;
        let Some(Code::Account(account)) = self.state.code(op.sender).cloned() else {
            return Err(EntryPointError::CallReverted {
                target: op.sender,
                error: CallError::Revert("no account deployed".to_string()),
            });
        };
        let mut state = self.state.clone();
        let env = self.env(op.gas_fees().gas_price(self.block.base_fee));
        let mut recorder = TraceRecorder::disabled();
        let mut meter = GasMeter::new(self.settings.call_gas_limit);
        CallContext::new(&mut state, &env, &mut recorder, &mut meter, from, from, 0)
            .invoke(op.sender, |ctx| {
                account.validate_user_op(ctx, op, request_id, required_prefund)
            })
            .map_err(|error| EntryPointError::CallReverted {
                target: op.sender,
                error,
            })?;
        self.state = state;
        Ok(meter.used())
    }

    /// Direct calls come from externally owned accounts only: neither the coordinator
    /// nor any deployed code can be named as the caller.
    fn require_external_caller(
        &self,
        from: Address,
        target: Address,
    ) -> Result<(), EntryPointError> {
        if from == self.address() || self.state.has_code(from) {
            warn!("Refused direct call to {target} posing as {from}");
            return Err(EntryPointError::CallReverted {
                target,
                error: CallError::Unauthorized(format!("{from} cannot send direct calls")),
            });
        }
        Ok(())
    }

    fn validate_prepayment(
        &self,
        state: &mut WorldState,
        op_index: usize,
        op: &UserOperation,
        recorder: &mut TraceRecorder,
    ) -> Result<ValidatedOp, FailedOp> {
        let fail = |kind: RejectionKind| FailedOp {
            op_index,
            paymaster: op.paymaster,
            kind,
        };
        if !op.gas_values_fit() {
            return Err(fail(RejectionKind::GasValuesOverflow));
        }

        let entry_point = self.address();
        let request_id = self.request_id(op);
        let gas_price = op.gas_fees().gas_price(self.block.base_fee);
        let required_prefund = op.required_prefund(gas_price);
        let env = self.env(gas_price);
        let verification_gas = to_gas(op.verification_gas);

        let mut account_meter = GasMeter::new(verification_gas);
        let factory = match op.factory() {
            Some(factory) => {
                if state.has_code(op.sender) {
                    return Err(fail(RejectionKind::SenderAlreadyConstructed));
                }
                let Some(Code::Factory(deployer)) = state.code(factory).cloned() else {
                    return Err(fail(RejectionKind::FactoryNotDeployed(factory)));
                };
                let deployed = self
                    .frame(state, &env, recorder, &mut account_meter)
                    .invoke(factory, |ctx| deployer.create_account(ctx, op.factory_data()))
                    .map_err(|e| fail(RejectionKind::InitCodeFailed(e)))?;
                if deployed != op.sender {
                    return Err(fail(RejectionKind::InitCodeReturnedWrongSender(deployed)));
                }
                debug!("Op {op_index}: factory {factory} deployed {deployed}");
                Some(factory)
            }
            None => None,
        };

        let Some(Code::Account(account)) = state.code(op.sender).cloned() else {
            return Err(fail(RejectionKind::AccountNotDeployed));
        };
        let missing_funds = if op.paymaster.is_some() {
            U256::ZERO
        } else {
            required_prefund
        };
        let balance_before = state.balance(entry_point);
        self.frame(state, &env, recorder, &mut account_meter)
            .invoke(op.sender, |ctx| {
                account.validate_user_op(ctx, op, request_id, missing_funds)
            })
            .map_err(|e| fail(RejectionKind::AccountReverted(e)))?;
        let paid = state.balance(entry_point).saturating_sub(balance_before);
        if paid < missing_funds {
            return Err(fail(RejectionKind::PrefundNotPaid {
                required: missing_funds,
                paid,
            }));
        }
        debug!(
            "Op {op_index}: account {} validated, {} validation gas used",
            op.sender,
            account_meter.used()
        );

        // The coordinator reads the block number exactly once, between the account
        // and paymaster frames. Trace screening splits the phases on it.
        self.frame(state, &env, recorder, &mut GasMeter::unmetered())
            .block_number()
            .map_err(|e| fail(RejectionKind::AccountReverted(e)))?;

        let mut paymaster_meter = GasMeter::new(verification_gas);
        let (prefund, paymaster_context, paymaster_info) = match op.paymaster {
            Some(paymaster) => {
                let Some(Code::Paymaster(sponsor)) = state.code(paymaster).cloned() else {
                    return Err(fail(RejectionKind::PaymasterNotDeployed));
                };
                let info = state.deposit_info(paymaster);
                if !info.is_staked(self.settings.min_stake, self.settings.min_unstake_delay_sec) {
                    return Err(fail(RejectionKind::PaymasterStakeTooLow {
                        stake: info.stake,
                        unstake_delay_sec: info.unstake_delay_sec,
                    }));
                }
                if info.deposit < required_prefund {
                    return Err(fail(RejectionKind::PaymasterDepositTooLow {
                        required: required_prefund,
                        deposit: info.deposit,
                    }));
                }
                state.deposit_info_mut(paymaster).deposit -= required_prefund;
                let context = self
                    .frame(state, &env, recorder, &mut paymaster_meter)
                    .invoke(paymaster, |ctx| {
                        sponsor.validate_paymaster_user_op(ctx, op, request_id, required_prefund)
                    })
                    .map_err(|e| fail(RejectionKind::PaymasterReverted(e)))?;
                debug!("Op {op_index}: paymaster {paymaster} accepted");
                (required_prefund, context, Some(info.stake_info()))
            }
            None => (paid, Bytes::new(), None),
        };

        let validation_gas = account_meter.used() + paymaster_meter.used();
        Ok(ValidatedOp {
            request_id,
            factory,
            output: ValidationOutput {
                pre_op_gas: op
                    .pre_verification_gas
                    .saturating_add(U256::from(validation_gas)),
                prefund,
                gas_price,
                paymaster_context,
                paymaster_info,
            },
        })
    }

    fn execute_user_op(
        &self,
        state: &mut WorldState,
        op: &UserOperation,
        validated: &ValidatedOp,
        events: &mut Vec<EntryPointEvent>,
    ) -> Result<OpOutcome, EntryPointError> {
        let ValidatedOp {
            request_id, output, ..
        } = validated;
        let env = self.env(output.gas_price);
        let mut recorder = TraceRecorder::disabled();
        let post_op = op
            .paymaster
            .filter(|_| !output.paymaster_context.is_empty());
        let checkpoint = post_op.map(|_| state.clone());

        let mut call_meter = GasMeter::new(to_gas(op.call_gas));
        let execution = if op.call_data.is_empty() {
            Ok(())
        } else {
            match state.code(op.sender).cloned() {
                Some(Code::Account(account)) => self
                    .frame(state, &env, &mut recorder, &mut call_meter)
                    .invoke(op.sender, |ctx| account.execute(ctx, &op.call_data)),
                _ => Err(CallError::Revert("account not deployed".to_string())),
            }
        };
        let mut revert_reason = execution.err().map(|e| e.to_string());
        let mut actual_gas = output
            .pre_op_gas
            .saturating_add(U256::from(call_meter.used()));

        if let (Some(paymaster), Some(checkpoint)) = (post_op, checkpoint) {
            if let Some(Code::Paymaster(sponsor)) = state.code(paymaster).cloned() {
                let mode = if revert_reason.is_none() {
                    PostOpMode::OpSucceeded
                } else {
                    PostOpMode::OpReverted
                };
                let cost_so_far = actual_gas.saturating_mul(output.gas_price);
                let mut post_op_meter = GasMeter::new(to_gas(op.verification_gas));
                let result = self
                    .frame(state, &env, &mut recorder, &mut post_op_meter)
                    .invoke(paymaster, |ctx| {
                        sponsor.post_op(ctx, mode, &output.paymaster_context, cost_so_far)
                    });
                actual_gas = actual_gas.saturating_add(U256::from(post_op_meter.used()));
                if let Err(e) = result {
                    *state = checkpoint;
                    revert_reason = Some(format!("AA50 postOp reverted: {e}"));
                }
            }
        }

        let actual_gas_cost = actual_gas.saturating_mul(output.gas_price).min(output.prefund);
        let refund = output.prefund - actual_gas_cost;
        match op.paymaster {
            Some(paymaster) => {
                let deposit = &mut state.deposit_info_mut(paymaster).deposit;
                *deposit = deposit.saturating_add(refund);
            }
            None => state
                .transfer(self.address(), op.sender, refund)
                .map_err(|e| anyhow!("refund to {} failed: {e}", op.sender))?,
        }

        let success = revert_reason.is_none();
        if let Some(reason) = &revert_reason {
            warn!("Op {request_id} from {} reverted: {reason}", op.sender);
            events.push(EntryPointEvent::RevertReason(UserOperationRevertReason {
                request_id: *request_id,
                sender: op.sender,
                nonce: op.nonce,
                revert_reason: reason.clone(),
            }));
        }
        events.push(EntryPointEvent::UserOperation(UserOperationEvent {
            request_id: *request_id,
            sender: op.sender,
            paymaster: op.paymaster,
            nonce: op.nonce,
            success,
            actual_gas_cost,
            actual_gas_price: output.gas_price,
        }));
        info!(
            "Settled op {request_id} from {}: success {success}, gas {actual_gas}, cost {actual_gas_cost}",
            op.sender
        );

        Ok(OpOutcome {
            request_id: *request_id,
            sender: op.sender,
            nonce: op.nonce,
            success,
            actual_gas_used: actual_gas,
            actual_gas_cost,
            actual_gas_price: output.gas_price,
            revert_reason,
        })
    }

    fn env(&self, gas_price: U256) -> ExecutionEnv {
        ExecutionEnv {
            block: self.block,
            gas_price,
            schedule: self.settings.gas.clone(),
        }
    }

    fn frame<'s>(
        &self,
        state: &'s mut WorldState,
        env: &'s ExecutionEnv,
        recorder: &'s mut TraceRecorder,
        meter: &'s mut GasMeter,
    ) -> CallContext<'s> {
        CallContext::new(
            state,
            env,
            recorder,
            meter,
            self.address(),
            self.address(),
            1,
        )
    }

    fn emit(&mut self, event: EntryPointEvent) {
        self.emitter.emit(event.clone());
        self.logs.push(event);
    }

    fn commit(&mut self, state: WorldState, events: Vec<EntryPointEvent>) {
        self.state = state;
        for event in events {
            self.emit(event);
        }
    }
}

fn to_gas(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
