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

//! Settler common types

pub mod contracts;

mod entity;
pub use entity::{Entity, EntityType};

mod error;
pub use error::{CallError, EntryPointError, FailedOp, RejectionKind};

mod events;
pub use events::{EntryPointEvent, UserOperationEvent, UserOperationRevertReason};

mod gas;
pub use gas::{call_data_cost, GasFees};

mod opcode;
pub use opcode::{Opcode, ViolationOpCode};

pub mod revert;

mod trace;
pub use trace::{TraceStep, ValidationTrace};

mod user_operation;
pub use user_operation::{UserOperation, UserOperationId, PACKED_FOR_HASH_LEN};

mod validation_results;
pub use validation_results::{DepositInfo, PostOpMode, StakeInfo, ValidationOutput};
