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


#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
//! Admission screening for user operations.
//!
//! Includes implementations for:
//!
//! - Validation tracing, against the in-memory coordinator or from geth struct logs
//! - Trace screening for banned environment reads
//! - Simulation with a timeout, alone or concurrently
//!
//! ## Feature Flags
//!
//! - `test-utils`: Export mocks and utilities for testing.

pub mod guard;
pub use guard::{Settings as GuardSettings, SimulationGuard};

mod simulator;
#[cfg(feature = "test-utils")]
pub use simulator::MockSimulator;
pub use simulator::{
    Settings as SimulationSettings, SimulationError, SimulationResult, Simulator, SimulatorImpl,
};

mod tracer;
#[cfg(feature = "test-utils")]
pub use tracer::MockExecutionTracer;
pub use tracer::{EntryPointTracer, ExecutionTracer, StructLogTrace, TracedValidation};

mod types;
pub use types::{SimulationViolation, ViolationError};
