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

//! ABI definitions shared by the coordinator, the wallets and the CLI

#![allow(non_snake_case)]
#![allow(clippy::all)]
#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    /// The hashed form of an operation: every variable-length field is replaced by its
    /// keccak digest so the encoding has a fixed width.
    #[derive(Default, Debug, PartialEq, Eq)]
    struct PackedUserOperation {
        address sender;
        uint256 nonce;
        bytes32 initCodeHash;
        bytes32 callDataHash;
        uint256 callGas;
        uint256 verificationGas;
        uint256 preVerificationGas;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        address paymaster;
        bytes32 paymasterDataHash;
    }

    /// Raised by the coordinator when any operation of a batch fails validation.
    #[derive(Debug, PartialEq, Eq)]
    error FailedOp(uint256 opIndex, address paymaster, string reason);

    interface ISimpleWallet {
        function exec(address dest, uint256 value, bytes func);
        function execBatch(address[] dest, bytes[] func);
        function transfer(address dest, uint256 amount);
    }

    interface ISimpleWalletFactory {
        function createAccount(address owner, uint256 salt);
    }
}
