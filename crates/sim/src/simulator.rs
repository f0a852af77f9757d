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


use std::time::Duration;

use alloy_primitives::{B256, U256};
use anyhow::Error;
use async_trait::async_trait;
use futures_util::future;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use settler_types::{Entity, StakeInfo, UserOperation};
use tracing::{debug, info};

use crate::{
    guard::{self, SimulationGuard},
    tracer::ExecutionTracer,
    SimulationViolation, ViolationError,
};

/// The result of a successful simulation
#[derive(Clone, Debug, Default)]
pub struct SimulationResult {
    /// Request id of the simulated operation
    pub request_id: B256,
    /// Gas used before execution, as measured by the coordinator
    pub pre_op_gas: U256,
    /// Prefund the operation would lock
    pub prefund: U256,
    /// Whether the paymaster asked for a post-op call
    pub requires_post_op: bool,
    /// Stake of the paymaster, when there is one
    pub paymaster_info: Option<StakeInfo>,
    /// Every entity taking part in the operation
    pub entities: Vec<Entity>,
    /// Number of instructions validation executed
    pub trace_len: usize,
}

/// Error returned by simulation
#[derive(Clone, Debug, thiserror::Error)]
#[error("{violation_error}")]
pub struct SimulationError {
    /// The rules the operation broke, or some other error not directly related to them
    pub violation_error: ViolationError<SimulationViolation>,
}

impl From<Error> for SimulationError {
    fn from(error: Error) -> Self {
        SimulationError {
            violation_error: ViolationError::Other(error),
        }
    }
}

impl From<ViolationError<SimulationViolation>> for SimulationError {
    fn from(violation_error: ViolationError<SimulationViolation>) -> Self {
        SimulationError { violation_error }
    }
}

impl From<Vec<SimulationViolation>> for SimulationError {
    fn from(violations: Vec<SimulationViolation>) -> Self {
        ViolationError::Violations(violations).into()
    }
}

/// Simulator trait for screening operations before admitting them
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Simulator: Send + Sync + 'static {
    /// Simulate the validation of an operation, returning what it would lock up
    /// upon success, or the rules it breaks.
    async fn simulate_validation(
        &self,
        op: UserOperation,
    ) -> Result<SimulationResult, SimulationError>;
}

/// Simulation Settings
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Longest a single trace may take, in milliseconds
    pub timeout_millis: u64,
    /// Trace screening rules
    pub guard: guard::Settings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_millis: 10_000,
            guard: guard::Settings::default(),
        }
    }
}

/// Simulator that traces with an [`ExecutionTracer`] and screens the trace with a
/// [`SimulationGuard`]
#[derive(Debug)]
pub struct SimulatorImpl<T> {
    tracer: T,
    guard: SimulationGuard,
    timeout: Duration,
}

impl<T: ExecutionTracer> SimulatorImpl<T> {
    /// Create a new simulator
    pub fn new(tracer: T, settings: Settings) -> Self {
        Self {
            tracer,
            guard: SimulationGuard::new(settings.guard),
            timeout: Duration::from_millis(settings.timeout_millis),
        }
    }

    /// Simulate many operations concurrently, returning results in input order
    pub async fn simulate_all(
        &self,
        ops: Vec<UserOperation>,
    ) -> Vec<Result<SimulationResult, SimulationError>> {
        future::join_all(ops.into_iter().map(|op| self.simulate_validation(op))).await
    }
}

#[async_trait]
impl<T: ExecutionTracer> Simulator for SimulatorImpl<T> {
    async fn simulate_validation(
        &self,
        op: UserOperation,
    ) -> Result<SimulationResult, SimulationError> {
        let traced = tokio::time::timeout(self.timeout, self.tracer.trace_validation(op.clone()))
            .await
            .map_err(|_| {
                vec![SimulationViolation::SimulationTimedOut(
                    self.timeout.as_millis() as u64,
                )]
            })??;

        let output = traced.outcome.map_err(|failed| {
            debug!("Validation of op from {} rejected: {failed}", op.sender);
            vec![SimulationViolation::ValidationRejected(failed.reason())]
        })?;

        let violations = self.guard.check(&op, &traced.trace);
        if !violations.is_empty() {
            info!(
                "Op from {} broke {} simulation rules",
                op.sender,
                violations.len()
            );
            return Err(violations.into());
        }

        Ok(SimulationResult {
            request_id: traced.request_id,
            pre_op_gas: output.pre_op_gas,
            prefund: output.prefund,
            requires_post_op: !output.paymaster_context.is_empty(),
            paymaster_info: output.paymaster_info,
            entities: op.entities(),
            trace_len: traced.trace.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Bytes};
    use settler_types::{
        CallError, EntityType, FailedOp, Opcode, RejectionKind, TraceStep, ValidationOutput,
        ValidationTrace, ViolationOpCode,
    };

    use std::sync::Arc;

    use parking_lot::RwLock;
    use settler_entry_point::{
        Account, CallContext, EntryPoint, EntryPointSettings, SimpleWallet, SponsorPaymaster,
        Storage,
    };
    use settler_signer::{deterministic_signer, sign_user_op};

    use super::*;
    use crate::tracer::{EntryPointTracer, MockExecutionTracer, TracedValidation};

    const SENDER: Address = Address::repeat_byte(0x11);
    const PAYMASTER: Address = Address::repeat_byte(0x44);

    fn op() -> UserOperation {
        UserOperation {
            sender: SENDER,
            paymaster: Some(PAYMASTER),
            ..Default::default()
        }
    }

    fn trace(extra_account_op: Option<Opcode>) -> ValidationTrace {
        let mut steps = vec![
            TraceStep::new(Opcode::GAS, 1),
            TraceStep::new(Opcode::CALL, 1),
            TraceStep::new(Opcode::SLOAD, 2),
            TraceStep::new(Opcode::POP, 2),
        ];
        if let Some(op) = extra_account_op {
            steps.push(TraceStep::new(op, 2));
        }
        steps.extend([
            TraceStep::new(Opcode::RETURN, 2),
            TraceStep::new(Opcode::NUMBER, 1),
            TraceStep::new(Opcode::GAS, 1),
            TraceStep::new(Opcode::CALL, 1),
            TraceStep::new(Opcode::POP, 2),
            TraceStep::new(Opcode::RETURN, 2),
        ]);
        steps.into()
    }

    fn passed(trace: ValidationTrace) -> TracedValidation {
        TracedValidation {
            request_id: B256::repeat_byte(0xab),
            trace,
            outcome: Ok(ValidationOutput {
                pre_op_gas: U256::from(50_000),
                prefund: U256::from(1_000),
                gas_price: U256::from(1),
                paymaster_context: Bytes::from(vec![1]),
                paymaster_info: Some(StakeInfo {
                    stake: U256::from(100),
                    unstake_delay_sec: 10,
                }),
            }),
        }
    }

    fn simulator(tracer: MockExecutionTracer) -> SimulatorImpl<MockExecutionTracer> {
        SimulatorImpl::new(tracer, Settings::default())
    }

    #[tokio::test]
    async fn clean_validation_passes() {
        let mut tracer = MockExecutionTracer::new();
        tracer
            .expect_trace_validation()
            .returning(|_| Ok(passed(trace(None))));

        let result = simulator(tracer).simulate_validation(op()).await.unwrap();
        assert_eq!(result.request_id, B256::repeat_byte(0xab));
        assert_eq!(result.pre_op_gas, U256::from(50_000));
        assert!(result.requires_post_op);
        assert_eq!(result.trace_len, 10);
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.entities[1].kind, EntityType::Paymaster);
    }

    #[tokio::test]
    async fn banned_opcode_is_reported() {
        let mut tracer = MockExecutionTracer::new();
        tracer
            .expect_trace_validation()
            .returning(|_| Ok(passed(trace(Some(Opcode::GASPRICE)))));

        let err = simulator(tracer)
            .simulate_validation(op())
            .await
            .unwrap_err();
        assert_eq!(
            err.violation_error.violations(),
            &[SimulationViolation::UsedForbiddenOpcode(
                Entity::account(SENDER),
                ViolationOpCode(Opcode::GASPRICE)
            )]
        );
    }

    #[tokio::test]
    async fn rejected_validation_is_reported() {
        let mut tracer = MockExecutionTracer::new();
        tracer.expect_trace_validation().returning(|_| {
            Ok(TracedValidation {
                request_id: B256::ZERO,
                trace: ValidationTrace::default(),
                outcome: Err(FailedOp {
                    op_index: 0,
                    paymaster: None,
                    kind: RejectionKind::AccountReverted(CallError::BadSignature),
                }),
            })
        });

        let err = simulator(tracer)
            .simulate_validation(op())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation rejected: AA23 reverted: wallet: wrong signature"
        );
    }

    #[tokio::test]
    async fn tracer_failure_is_other_error() {
        let mut tracer = MockExecutionTracer::new();
        tracer
            .expect_trace_validation()
            .returning(|_| Err(anyhow::anyhow!("node unreachable")));

        let err = simulator(tracer)
            .simulate_validation(op())
            .await
            .unwrap_err();
        assert!(matches!(err.violation_error, ViolationError::Other(_)));
        assert_eq!(err.to_string(), "node unreachable");
    }

    #[derive(Debug)]
    struct StalledTracer;

    #[async_trait]
    impl ExecutionTracer for StalledTracer {
        async fn trace_validation(
            &self,
            _op: UserOperation,
        ) -> anyhow::Result<TracedValidation> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(passed(trace(None)))
        }
    }

    #[tokio::test]
    async fn slow_tracer_times_out() {
        let simulator = SimulatorImpl::new(
            StalledTracer,
            Settings {
                timeout_millis: 10,
                ..Default::default()
            },
        );
        let err = simulator.simulate_validation(op()).await.unwrap_err();
        assert_eq!(
            err.violation_error.violations(),
            &[SimulationViolation::SimulationTimedOut(10)]
        );
    }

    #[tokio::test]
    async fn simulates_many_in_order() {
        let mut tracer = MockExecutionTracer::new();
        tracer.expect_trace_validation().returning(|op| {
            let extra = (op.nonce == U256::from(1)).then_some(Opcode::BASEFEE);
            Ok(passed(trace(extra)))
        });
        let ops = (0..3u64)
            .map(|nonce| UserOperation {
                nonce: U256::from(nonce),
                ..op()
            })
            .collect();

        let results = simulator(tracer).simulate_all(ops).await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[derive(Debug)]
    struct PriceReadingAccount;

    impl Account for PriceReadingAccount {
        fn validate_user_op(
            &self,
            ctx: &mut CallContext<'_>,
            _op: &UserOperation,
            _request_id: B256,
            required_prefund: U256,
        ) -> Result<(), CallError> {
            ctx.gas_price()?;
            let caller = ctx.caller();
            ctx.transfer(caller, required_prefund)
        }

        fn execute(&self, _ctx: &mut CallContext<'_>, _call_data: &[u8]) -> Result<(), CallError> {
            Ok(())
        }

        fn nonce(&self, _storage: &Storage) -> U256 {
            U256::ZERO
        }
    }

    fn ether() -> U256 {
        U256::from(10).pow(U256::from(18))
    }

    fn in_memory(entry_point: EntryPoint) -> SimulatorImpl<EntryPointTracer> {
        SimulatorImpl::new(
            EntryPointTracer::new(Arc::new(RwLock::new(entry_point))),
            Settings::default(),
        )
    }

    fn unsigned_op(paymaster: Option<Address>) -> UserOperation {
        UserOperation {
            sender: SENDER,
            call_gas: U256::from(100_000),
            verification_gas: U256::from(100_000),
            max_fee_per_gas: U256::from(1),
            max_priority_fee_per_gas: U256::from(1),
            paymaster,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn recorded_price_read_is_banned() {
        let mut entry_point = EntryPoint::new(EntryPointSettings::default());
        entry_point.deploy_account(SENDER, PriceReadingAccount);
        entry_point.fund(SENDER, ether());

        let err = in_memory(entry_point)
            .simulate_validation(unsigned_op(None))
            .await
            .unwrap_err();
        assert!(err
            .violation_error
            .violations()
            .contains(&SimulationViolation::UsedForbiddenOpcode(
                Entity::account(SENDER),
                ViolationOpCode(Opcode::GASPRICE)
            )));
    }

    #[tokio::test]
    async fn sponsored_wallet_passes_screening() {
        let mut entry_point = EntryPoint::new(EntryPointSettings {
            min_stake: U256::from(100),
            min_unstake_delay_sec: 10,
            ..Default::default()
        });
        let owner = deterministic_signer(1).unwrap();
        entry_point.deploy_account(SENDER, SimpleWallet::new(entry_point.address(), owner.address()));
        entry_point.deploy_paymaster(PAYMASTER, SponsorPaymaster::new([SENDER]));
        entry_point.fund(PAYMASTER, ether() + U256::from(100));
        entry_point
            .add_stake(PAYMASTER, U256::from(100), 10)
            .unwrap();
        entry_point
            .deposit_to(PAYMASTER, PAYMASTER, ether())
            .unwrap();
        let op = sign_user_op(
            &owner,
            unsigned_op(Some(PAYMASTER)),
            entry_point.address(),
            entry_point.chain_id(),
        )
        .unwrap();
        let request_id = entry_point.request_id(&op);

        let result = in_memory(entry_point).simulate_validation(op).await.unwrap();
        assert_eq!(result.request_id, request_id);
        assert_eq!(result.prefund, U256::from(400_000));
        assert_eq!(
            result.paymaster_info,
            Some(StakeInfo {
                stake: U256::from(100),
                unstake_delay_sec: 10,
            })
        );
        assert!(result.trace_len > 0);
    }
}
