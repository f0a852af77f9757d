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


//! Screening of validation traces for environment reads that make validation
//! non-deterministic

use serde::{Deserialize, Serialize};
use settler_types::{Entity, Opcode, TraceStep, UserOperation, ValidationTrace, ViolationOpCode};
use tracing::debug;

use crate::SimulationViolation;

/// Trace screening rules
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Instructions the account phase must not execute
    pub account_banned_opcodes: Vec<Opcode>,
    /// Instructions the paymaster phase must not execute
    pub paymaster_banned_opcodes: Vec<Opcode>,
    /// The instruction the coordinator executes exactly once between the phases
    pub separator: Opcode,
    /// Whether each inspected phase must contain a `POP`
    pub require_pop: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            account_banned_opcodes: vec![
                Opcode::GAS,
                Opcode::BASEFEE,
                Opcode::GASPRICE,
                Opcode::NUMBER,
            ],
            paymaster_banned_opcodes: vec![Opcode::BASEFEE, Opcode::GASPRICE],
            separator: Opcode::NUMBER,
            require_pop: true,
        }
    }
}

/// Checks that an operation's validation only depends on state it cannot be
/// invalidated through by the time it is included.
#[derive(Clone, Debug, Default)]
pub struct SimulationGuard {
    settings: Settings,
}

impl SimulationGuard {
    /// A guard applying `settings`
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// The rules this guard applies
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Every rule the validation `trace` of `op` breaks, sorted and deduplicated.
    ///
    /// The trace splits on the single separator read: the account phase is everything
    /// before the step preceding it, the paymaster phase everything after it. Only
    /// steps below the coordinator's own frame (depth > 1) are inspected, and the
    /// paymaster phase only when `op` names a paymaster.
    pub fn check(&self, op: &UserOperation, trace: &ValidationTrace) -> Vec<SimulationViolation> {
        let steps = trace.steps();
        let separators: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.op == self.settings.separator)
            .map(|(index, _)| index)
            .collect();
        let &[separator] = separators.as_slice() else {
            return vec![SimulationViolation::WrongNumberOfSeparators(
                ViolationOpCode(self.settings.separator),
                separators.len(),
            )];
        };

        let mut violations = vec![];
        let account_ops = nested_ops(&steps[..separator.saturating_sub(1)]);
        self.check_phase(
            Entity::account(op.sender),
            &account_ops,
            &self.settings.account_banned_opcodes,
            &mut violations,
        );
        if let Some(paymaster) = op.paymaster {
            let paymaster_ops = nested_ops(&steps[separator + 1..]);
            self.check_phase(
                Entity::paymaster(paymaster),
                &paymaster_ops,
                &self.settings.paymaster_banned_opcodes,
                &mut violations,
            );
        }

        violations.sort();
        violations.dedup();
        if !violations.is_empty() {
            debug!("Trace of {} steps broke {} rules", steps.len(), violations.len());
        }
        violations
    }

    fn check_phase(
        &self,
        entity: Entity,
        ops: &[Opcode],
        banned: &[Opcode],
        violations: &mut Vec<SimulationViolation>,
    ) {
        if self.settings.require_pop && !ops.contains(&Opcode::POP) {
            violations.push(SimulationViolation::InvalidOpsList(entity.kind));
        }
        for (index, op) in ops.iter().enumerate() {
            // forwarding gas into a call
            if *op == Opcode::GAS && ops.get(index + 1).is_some_and(Opcode::is_call) {
                continue;
            }
            if banned.contains(op) {
                violations.push(SimulationViolation::UsedForbiddenOpcode(
                    entity,
                    ViolationOpCode(*op),
                ));
            }
        }
    }
}

fn nested_ops(steps: &[TraceStep]) -> Vec<Opcode> {
    steps
        .iter()
        .filter(|step| step.depth > 1)
        .map(|step| step.op)
        .collect()
}
