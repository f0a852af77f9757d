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

//! Settler coordinator: validates user operations against their wallets and paymasters,
//! executes them and settles their fees on an in-memory ledger.

mod account;
pub use account::{Account, AccountFactory, Paymaster};

mod context;
pub use context::{BlockEnv, CallContext};

mod entry_point;
pub use entry_point::{EntryPoint, OpOutcome, SimulatedValidation};

mod gas;
pub use gas::{GasMeter, GasSchedule};

mod paymaster;
pub use paymaster::SponsorPaymaster;

mod settings;
pub use settings::{EntryPointSettings, DEFAULT_ENTRY_POINT_ADDRESS};

mod state;
pub use state::{Code, Storage, WorldState};

mod wallet;
pub use wallet::{SimpleWallet, SimpleWalletFactory};
