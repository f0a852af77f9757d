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


use std::fmt::{Display, Formatter};

use settler_types::{Entity, EntityType, ViolationOpCode};

/// Why an operation is refused admission
#[derive(Clone, Debug, parse_display::Display, Ord, Eq, PartialOrd, PartialEq)]
pub enum SimulationViolation {
    // Ordered by importance: the smallest violation is the one reported first
    /// Validation itself refused the operation
    #[display("validation rejected: {0}")]
    ValidationRejected(String),
    /// A validation phase executed an environment read whose result can change between
    /// simulation and inclusion
    #[display("{0.kind} uses banned opcode: {1} in contract {0.address}")]
    UsedForbiddenOpcode(Entity, ViolationOpCode),
    /// The trace does not split into account and paymaster phases
    #[display("expected exactly one {0} separating account and paymaster validation, found {1}")]
    WrongNumberOfSeparators(ViolationOpCode, usize),
    /// A validation phase shows no sign of having run
    #[display("not a valid ops list for {0} validation")]
    InvalidOpsList(EntityType),
    /// Tracing did not finish in time
    #[display("simulation timed out after {0}ms")]
    SimulationTimedOut(u64),
}

/// An error that occurs when an operation breaks an admission rule.
#[derive(Debug, thiserror::Error)]
pub enum ViolationError<T> {
    /// Every rule the operation broke
    Violations(Vec<T>),

    /// Other error that occurs during simulation
    Other(#[from] anyhow::Error),
}

impl<T> ViolationError<T> {
    /// The violations, empty for other errors
    pub fn violations(&self) -> &[T] {
        match self {
            ViolationError::Violations(violations) => violations,
            ViolationError::Other(_) => &[],
        }
    }
}

impl<T> Clone for ViolationError<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            ViolationError::Violations(violations) => {
                ViolationError::Violations(violations.clone())
            }
            ViolationError::Other(error) => {
                ViolationError::Other(anyhow::anyhow!(error.to_string()))
            }
        }
    }
}

impl<T> From<Vec<T>> for ViolationError<T> {
    fn from(violations: Vec<T>) -> Self {
        Self::Violations(violations)
    }
}

impl<T: Display> Display for ViolationError<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationError::Violations(violations) => match violations.as_slice() {
                [violation] => Display::fmt(violation, f),
                _ => {
                    f.write_str("multiple violations: ")?;
                    for violation in violations {
                        Display::fmt(violation, f)?;
                        f.write_str("; ")?;
                    }
                    Ok(())
                }
            },
            ViolationError::Other(error) => Display::fmt(error, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use settler_types::Opcode;

    use super::*;

    #[test]
    fn violation_display() {
        let sender = Address::repeat_byte(1);
        let violation =
            SimulationViolation::UsedForbiddenOpcode(Entity::account(sender), ViolationOpCode(Opcode::GASPRICE));
        assert_eq!(
            violation.to_string(),
            format!("account uses banned opcode: GASPRICE in contract {sender}")
        );
        assert_eq!(
            SimulationViolation::WrongNumberOfSeparators(ViolationOpCode(Opcode::NUMBER), 2)
                .to_string(),
            "expected exactly one NUMBER separating account and paymaster validation, found 2"
        );
    }

    #[test]
    fn multiple_violations_are_listed() {
        let error: ViolationError<SimulationViolation> = vec![
            SimulationViolation::InvalidOpsList(EntityType::Paymaster),
            SimulationViolation::SimulationTimedOut(10),
        ]
        .into();
        assert_eq!(
            error.to_string(),
            "multiple violations: not a valid ops list for paymaster validation; simulation timed out after 10ms; "
        );
        assert_eq!(error.clone().violations().len(), 2);
    }

    #[test]
    fn rejection_sorts_first() {
        let mut violations = vec![
            SimulationViolation::SimulationTimedOut(1),
            SimulationViolation::InvalidOpsList(EntityType::Account),
            SimulationViolation::ValidationRejected("AA23".into()),
        ];
        violations.sort();
        assert!(matches!(
            violations[0],
            SimulationViolation::ValidationRejected(_)
        ));
    }
}
