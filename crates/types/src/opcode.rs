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

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumCount, EnumIter, EnumString, VariantNames};

/// An opcode as it appears in a simulation violation, ordered by its byte value
#[derive(Debug, PartialEq, Clone, Copy, parse_display::Display, Eq)]
#[display("{0}")]
pub struct ViolationOpCode(pub Opcode);

impl PartialOrd for ViolationOpCode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ViolationOpCode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0 as u8).cmp(&(other.0 as u8))
    }
}

/// An EVM instruction, named by its mnemonic.
///
/// Mnemonics parse the way geth prints them in `structLogs`, including the legacy
/// `SHA3` and `DIFFICULTY` spellings.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRefStr,
    Display,
    EnumString,
    VariantNames,
    EnumIter,
    EnumCount,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    // arithmetic
    STOP = 0x00,
    ADD,
    MUL,
    SUB,
    DIV,
    SDIV,
    MOD,
    SMOD,
    ADDMOD,
    MULMOD,
    EXP,
    SIGNEXTEND,

    // comparison and bitwise
    LT = 0x10,
    GT,
    SLT,
    SGT,
    EQ,
    ISZERO,
    AND,
    OR,
    XOR,
    NOT,
    BYTE,
    SHL,
    SHR,
    SAR,

    #[strum(to_string = "KECCAK256", serialize = "SHA3")]
    #[serde(alias = "SHA3")]
    KECCAK256 = 0x20,

    // call environment
    ADDRESS = 0x30,
    BALANCE,
    ORIGIN,
    CALLER,
    CALLVALUE,
    CALLDATALOAD,
    CALLDATASIZE,
    CALLDATACOPY,
    CODESIZE,
    CODECOPY,
    GASPRICE,
    EXTCODESIZE,
    EXTCODECOPY,
    RETURNDATASIZE,
    RETURNDATACOPY,
    EXTCODEHASH,

    // block environment
    BLOCKHASH = 0x40,
    COINBASE,
    TIMESTAMP,
    NUMBER,
    #[strum(to_string = "PREVRANDAO", serialize = "DIFFICULTY")]
    #[serde(alias = "DIFFICULTY")]
    PREVRANDAO,
    GASLIMIT,
    CHAINID,
    SELFBALANCE,
    BASEFEE,
    BLOBHASH,
    BLOBBASEFEE,

    // stack, memory, storage and flow
    POP = 0x50,
    MLOAD,
    MSTORE,
    MSTORE8,
    SLOAD,
    SSTORE,
    JUMP,
    JUMPI,
    PC,
    MSIZE,
    GAS,
    JUMPDEST,
    TLOAD,
    TSTORE,
    MCOPY,
    PUSH0,

    PUSH1 = 0x60,
    PUSH2,
    PUSH3,
    PUSH4,
    PUSH5,
    PUSH6,
    PUSH7,
    PUSH8,
    PUSH9,
    PUSH10,
    PUSH11,
    PUSH12,
    PUSH13,
    PUSH14,
    PUSH15,
    PUSH16,
    PUSH17,
    PUSH18,
    PUSH19,
    PUSH20,
    PUSH21,
    PUSH22,
    PUSH23,
    PUSH24,
    PUSH25,
    PUSH26,
    PUSH27,
    PUSH28,
    PUSH29,
    PUSH30,
    PUSH31,
    PUSH32,

    DUP1 = 0x80,
    DUP2,
    DUP3,
    DUP4,
    DUP5,
    DUP6,
    DUP7,
    DUP8,
    DUP9,
    DUP10,
    DUP11,
    DUP12,
    DUP13,
    DUP14,
    DUP15,
    DUP16,

    SWAP1 = 0x90,
    SWAP2,
    SWAP3,
    SWAP4,
    SWAP5,
    SWAP6,
    SWAP7,
    SWAP8,
    SWAP9,
    SWAP10,
    SWAP11,
    SWAP12,
    SWAP13,
    SWAP14,
    SWAP15,
    SWAP16,

    LOG0 = 0xa0,
    LOG1,
    LOG2,
    LOG3,
    LOG4,

    // system
    CREATE = 0xf0,
    CALL,
    CALLCODE,
    RETURN,
    DELEGATECALL,
    CREATE2,
    STATICCALL = 0xfa,
    REVERT = 0xfd,
    INVALID,
    SELFDESTRUCT,
}

impl Opcode {
    /// Whether this instruction transfers control to another frame.
    ///
    /// Reading `GAS` immediately before one of these is how compilers forward gas, so
    /// that pairing is not treated as an environment read.
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            Opcode::CALL | Opcode::CALLCODE | Opcode::DELEGATECALL | Opcode::STATICCALL
        )
    }

    /// Parses a mnemonic, mapping anything unknown (geth prints `opcode 0xef not defined`)
    /// to `INVALID`.
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        mnemonic.parse().unwrap_or(Opcode::INVALID)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn discriminants_match_byte_values() {
        assert_eq!(Opcode::try_from(0x3a).unwrap(), Opcode::GASPRICE);
        assert_eq!(Opcode::try_from(0x43).unwrap(), Opcode::NUMBER);
        assert_eq!(Opcode::try_from(0x48).unwrap(), Opcode::BASEFEE);
        assert_eq!(Opcode::try_from(0x5a).unwrap(), Opcode::GAS);
        assert_eq!(Opcode::try_from(0x7f).unwrap(), Opcode::PUSH32);
        assert_eq!(Opcode::try_from(0x9f).unwrap(), Opcode::SWAP16);
        assert_eq!(Opcode::try_from(0xfa).unwrap(), Opcode::STATICCALL);
        assert_eq!(Opcode::try_from(0xff).unwrap(), Opcode::SELFDESTRUCT);
        assert!(Opcode::try_from(0xef).is_err());
    }

    #[test]
    fn legacy_mnemonics_parse() {
        assert_eq!(Opcode::from_str("SHA3").unwrap(), Opcode::KECCAK256);
        assert_eq!(Opcode::from_str("DIFFICULTY").unwrap(), Opcode::PREVRANDAO);
        assert_eq!(Opcode::KECCAK256.to_string(), "KECCAK256");
        assert_eq!(Opcode::from_mnemonic("opcode 0xef not defined"), Opcode::INVALID);
    }

    #[test]
    fn violation_opcodes_order_by_byte_value() {
        let mut ops = vec![
            ViolationOpCode(Opcode::GAS),
            ViolationOpCode(Opcode::GASPRICE),
            ViolationOpCode(Opcode::BASEFEE),
        ];
        ops.sort();
        assert_eq!(
            ops,
            vec![
                ViolationOpCode(Opcode::GASPRICE),
                ViolationOpCode(Opcode::BASEFEE),
                ViolationOpCode(Opcode::GAS),
            ]
        );
        assert!(Opcode::CALL.is_call() && !Opcode::CALLER.is_call());
    }
}
