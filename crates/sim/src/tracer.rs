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


use std::{str::FromStr, sync::Arc};

use alloy_primitives::B256;
use anyhow::Context;
use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use parking_lot::RwLock;
use serde::Deserialize;
use settler_entry_point::EntryPoint;
use settler_types::{
    EntryPointError, FailedOp, Opcode, TraceStep, UserOperation, ValidationOutput,
    ValidationTrace,
};

/// A validation run together with the instructions it executed
#[derive(Clone, Debug)]
pub struct TracedValidation {
    /// Request id of the traced operation
    pub request_id: B256,
    /// Instructions executed, in order
    pub trace: ValidationTrace,
    /// What validation concluded
    pub outcome: Result<ValidationOutput, FailedOp>,
}

/// Runs an operation's validation and records every instruction it executes
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ExecutionTracer: Send + Sync + 'static {
    /// Trace the validation of `op` without changing any state
    async fn trace_validation(&self, op: UserOperation) -> anyhow::Result<TracedValidation>;
}

/// Traces validation on a shared in-memory coordinator
#[derive(Clone, Debug)]
pub struct EntryPointTracer {
    entry_point: Arc<RwLock<EntryPoint>>,
}

impl EntryPointTracer {
    /// Create a tracer over `entry_point`
    pub fn new(entry_point: Arc<RwLock<EntryPoint>>) -> Self {
        Self { entry_point }
    }
}

#[async_trait]
impl ExecutionTracer for EntryPointTracer {
    async fn trace_validation(&self, op: UserOperation) -> anyhow::Result<TracedValidation> {
        let (request_id, simulated) = {
            let entry_point = self.entry_point.read();
            (entry_point.request_id(&op), entry_point.simulate_validation(&op))
        };
        match simulated {
            Ok(simulated) => Ok(TracedValidation {
                request_id,
                trace: simulated.trace,
                outcome: Ok(simulated.output),
            }),
            Err(EntryPointError::FailedOp(failed)) => Ok(TracedValidation {
                request_id,
                trace: ValidationTrace::default(),
                outcome: Err(failed),
            }),
            Err(error) => Err(error).context("simulating validation"),
        }
    }
}

/// A trace read from a geth `debug_traceTransaction` struct-log response
#[derive(Clone, Debug, Default)]
pub struct StructLogTrace(ValidationTrace);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructLogs {
    struct_logs: Vec<StructLog>,
}

#[derive(Deserialize)]
struct StructLog {
    op: String,
    depth: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StructLogResponse {
    Rpc { result: StructLogs },
    Bare(StructLogs),
}

impl StructLogTrace {
    /// The parsed trace
    pub fn trace(&self) -> &ValidationTrace {
        &self.0
    }

    /// Unwrap the parsed trace
    pub fn into_trace(self) -> ValidationTrace {
        self.0
    }
}

impl FromStr for StructLogTrace {
    type Err = anyhow::Error;

    /// Parses either the bare trace object or a full JSON-RPC response around it.
    /// Unknown mnemonics become `INVALID`.
    fn from_str(json: &str) -> Result<Self, Self::Err> {
        let logs = match serde_json::from_str(json).context("parsing struct logs")? {
            StructLogResponse::Rpc { result } => result,
            StructLogResponse::Bare(logs) => logs,
        };
        Ok(Self(
            logs.struct_logs
                .into_iter()
                .map(|log| TraceStep::new(Opcode::from_mnemonic(&log.op), log.depth))
                .collect(),
        ))
    }
}

impl From<StructLogTrace> for ValidationTrace {
    fn from(trace: StructLogTrace) -> Self {
        trace.0
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};
    use settler_entry_point::{EntryPointSettings, SimpleWallet};
    use settler_signer::{deterministic_signer, sign_user_op};
    use settler_types::RejectionKind;

    use super::*;

    #[test]
    fn parses_struct_logs() {
        let json = r#"{
            "gas": 21000,
            "failed": false,
            "structLogs": [
                {"pc": 0, "op": "PUSH1", "gas": 100, "depth": 1},
                {"pc": 2, "op": "SHA3", "gas": 97, "depth": 2},
                {"pc": 3, "op": "opcode 0xef not defined", "gas": 90, "depth": 2}
            ]
        }"#;
        let trace = StructLogTrace::from_str(json).unwrap().into_trace();
        let steps: Vec<_> = trace.iter().map(|s| (s.op, s.depth)).collect();
        assert_eq!(
            steps,
            vec![
                (Opcode::PUSH1, 1),
                (Opcode::KECCAK256, 2),
                (Opcode::INVALID, 2)
            ]
        );
    }

    #[test]
    fn parses_rpc_response() {
        let json = r#"{"jsonrpc": "2.0", "id": 1, "result": {"structLogs": [{"op": "NUMBER", "depth": 1}]}}"#;
        let trace: ValidationTrace = json.parse::<StructLogTrace>().unwrap().into();
        assert_eq!(trace.steps(), &[TraceStep::new(Opcode::NUMBER, 1)]);
    }

    #[test]
    fn rejects_other_json() {
        assert!(StructLogTrace::from_str(r#"{"logs": []}"#).is_err());
    }

    #[tokio::test]
    async fn traces_in_memory_coordinator() {
        let owner = deterministic_signer(3).unwrap();
        let sender = Address::repeat_byte(0x11);
        let mut entry_point = EntryPoint::new(EntryPointSettings::default());
        entry_point.deploy_account(sender, SimpleWallet::new(entry_point.address(), owner.address()));
        entry_point.fund(sender, U256::from(10).pow(U256::from(18)));
        let op = UserOperation {
            sender,
            call_gas: U256::from(100_000),
            verification_gas: U256::from(100_000),
            max_fee_per_gas: U256::from(1),
            max_priority_fee_per_gas: U256::from(1),
            ..Default::default()
        };
        let signed = sign_user_op(&owner, op.clone(), entry_point.address(), entry_point.chain_id())
            .unwrap();
        let tracer = EntryPointTracer::new(Arc::new(RwLock::new(entry_point)));

        let traced = tracer.trace_validation(signed).await.unwrap();
        assert!(traced.outcome.is_ok());
        assert!(traced.trace.iter().any(|s| s.op == Opcode::NUMBER));

        // unsigned: validation refuses it
        let traced = tracer.trace_validation(op).await.unwrap();
        assert!(matches!(
            traced.outcome.unwrap_err().kind,
            RejectionKind::AccountReverted(_)
        ));
        assert!(traced.trace.is_empty());
    }
}
