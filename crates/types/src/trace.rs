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

use serde::{Deserialize, Serialize};

use crate::opcode::Opcode;

/// One executed instruction with the call depth it ran at. The coordinator's own frame
/// is depth 1.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TraceStep {
    /// Instruction executed
    pub op: Opcode,
    /// Call depth
    pub depth: u64,
}

impl TraceStep {
    /// Create a step
    pub fn new(op: Opcode, depth: u64) -> Self {
        Self { op, depth }
    }
}

/// An ordered, finite instruction trace of one validation run.
///
/// Cloning is cheap and every clone can be iterated from the start any number of times.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationTrace {
    steps: Arc<[TraceStep]>,
}

impl ValidationTrace {
    /// Iterate the steps in execution order
    pub fn iter(&self) -> impl Iterator<Item = &TraceStep> + '_ {
        self.steps.iter()
    }

    /// The steps as a slice
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl From<Vec<TraceStep>> for ValidationTrace {
    fn from(steps: Vec<TraceStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl FromIterator<TraceStep> for ValidationTrace {
    fn from_iter<I: IntoIterator<Item = TraceStep>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_is_restartable() {
        let trace: ValidationTrace = [
            TraceStep::new(Opcode::GAS, 2),
            TraceStep::new(Opcode::CALL, 2),
        ]
        .into_iter()
        .collect();
        let clone = trace.clone();
        let first: Vec<_> = trace.iter().copied().collect();
        let second: Vec<_> = trace.iter().copied().collect();
        assert_eq!(first, second);
        assert_eq!(clone.steps(), &first[..]);
    }
}
