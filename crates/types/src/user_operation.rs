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

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::{contracts::PackedUserOperation, entity::Entity, gas::GasFees};

/// Number of bytes in the hashed encoding of an operation: eleven ABI words
pub const PACKED_FOR_HASH_LEN: usize = 11 * 32;

const ADDRESS_LEN: usize = 20;

/// Verification gas is reserved three times over when a paymaster is involved: once for
/// the account, once for the paymaster and once for its post-op hook.
const PAYMASTER_VERIFICATION_GAS_MULTIPLIER: u64 = 3;

/// Unique identifier for a user operation from a given sender
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct UserOperationId {
    /// sender of user operation
    pub sender: Address,
    /// nonce of user operation
    pub nonce: U256,
}

/// A request submitted by a relayer on behalf of a smart-contract wallet
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The wallet that will validate and execute this operation
    pub sender: Address,
    /// Replay-protection counter; must equal the wallet's current nonce
    pub nonce: U256,
    /// Factory address followed by its call data; non-empty only to deploy `sender`
    #[serde(default)]
    pub init_code: Bytes,
    /// Payload executed on the wallet
    #[serde(default)]
    pub call_data: Bytes,
    /// Gas limit for the execution phase
    pub call_gas: U256,
    /// Gas limit for each validation frame
    pub verification_gas: U256,
    /// Gas charged up front to cover the relayer's overhead
    pub pre_verification_gas: U256,
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: U256,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: U256,
    /// Optional sponsor paying the fees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Opaque data handed to the paymaster
    #[serde(default)]
    pub paymaster_data: Bytes,
    /// Wallet-interpreted signature over the request id
    #[serde(default)]
    pub signature: Bytes,
}

impl UserOperation {
    /// Encode every field except the signature, with variable-length fields replaced by
    /// their keccak digests.
    pub fn pack_for_hash(&self) -> Bytes {
        self.to_packed().abi_encode().into()
    }

    /// The full content encoding: the hashed form followed by the signature digest.
    pub fn pack(&self) -> Bytes {
        let mut packed = self.pack_for_hash().to_vec();
        packed.extend_from_slice(keccak256(&self.signature).as_slice());
        packed.into()
    }

    /// Digest of [`Self::pack_for_hash`]
    pub fn hash(&self) -> B256 {
        keccak256(self.pack_for_hash())
    }

    /// The message an owner signs: the operation digest bound to a coordinator deployment
    /// and a chain, so a signature cannot be replayed against either.
    pub fn request_id(&self, entry_point: Address, chain_id: u64) -> B256 {
        keccak256((self.hash(), entry_point, U256::from(chain_id)).abi_encode())
    }

    /// Gets the unique identifier for this operation
    pub fn id(&self) -> UserOperationId {
        UserOperationId {
            sender: self.sender,
            nonce: self.nonce,
        }
    }

    /// Factory named by the first 20 bytes of the init code, if any
    pub fn factory(&self) -> Option<Address> {
        (self.init_code.len() >= ADDRESS_LEN)
            .then(|| Address::from_slice(&self.init_code[..ADDRESS_LEN]))
    }

    /// Call data handed to the factory
    pub fn factory_data(&self) -> &[u8] {
        self.init_code.get(ADDRESS_LEN..).unwrap_or_default()
    }

    /// Paymaster address, or the zero address when the wallet pays for itself
    pub fn paymaster_or_zero(&self) -> Address {
        self.paymaster.unwrap_or_default()
    }

    /// Every entity that takes part in validating this operation
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(3);
        if let Some(factory) = self.factory() {
            entities.push(Entity::factory(factory));
        }
        entities.push(Entity::account(self.sender));
        if let Some(paymaster) = self.paymaster {
            entities.push(Entity::paymaster(paymaster));
        }
        entities
    }

    /// Fee caps of this operation
    pub fn gas_fees(&self) -> GasFees {
        GasFees {
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
        }
    }

    /// Worst-case gas this operation may consume
    pub fn required_gas(&self) -> U256 {
        let multiplier = if self.paymaster.is_some() {
            PAYMASTER_VERIFICATION_GAS_MULTIPLIER
        } else {
            1
        };
        self.call_gas
            .saturating_add(self.verification_gas.saturating_mul(U256::from(multiplier)))
            .saturating_add(self.pre_verification_gas)
    }

    /// Amount the payer must make available before execution at the given gas price
    pub fn required_prefund(&self, gas_price: U256) -> U256 {
        self.required_gas().saturating_mul(gas_price)
    }

    /// Whether every gas limit and fee fits the 128-bit range the coordinator meters in
    pub fn gas_values_fit(&self) -> bool {
        [
            self.call_gas,
            self.verification_gas,
            self.pre_verification_gas,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
        ]
        .iter()
        .all(|v| *v <= U256::from(u128::MAX))
    }

    fn to_packed(&self) -> PackedUserOperation {
        PackedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            initCodeHash: keccak256(&self.init_code),
            callDataHash: keccak256(&self.call_data),
            callGas: self.call_gas,
            verificationGas: self.verification_gas,
            preVerificationGas: self.pre_verification_gas,
            maxFeePerGas: self.max_fee_per_gas,
            maxPriorityFeePerGas: self.max_priority_fee_per_gas,
            paymaster: self.paymaster_or_zero(),
            paymasterDataHash: keccak256(&self.paymaster_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, bytes};

    use super::*;

    fn sample_op() -> UserOperation {
        UserOperation {
            sender: address!("1306b01bc3e4ad202612d3843387e94737673f53"),
            nonce: U256::from(8942),
            init_code: bytes!("6942069420694206942069420694206942069420"),
            call_data: bytes!("0000000000000000000000000000000000000000080085"),
            call_gas: U256::from(10_000),
            verification_gas: U256::from(100_000),
            pre_verification_gas: U256::from(100),
            max_fee_per_gas: U256::from(99_999),
            max_priority_fee_per_gas: U256::from(9_999_999),
            paymaster: Some(address!("0123456789abcdef0123456789abcdef01234567")),
            paymaster_data: bytes!("beef"),
            signature: bytes!("deadbeef"),
        }
    }

    fn word(v: impl Into<U256>) -> [u8; 32] {
        v.into().to_be_bytes()
    }

    fn address_word(a: Address) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[12..].copy_from_slice(a.as_slice());
        w
    }

    #[test]
    fn pack_for_hash_layout() {
        let op = sample_op();
        let mut expected = Vec::new();
        expected.extend(address_word(op.sender));
        expected.extend(word(op.nonce));
        expected.extend_from_slice(keccak256(&op.init_code).as_slice());
        expected.extend_from_slice(keccak256(&op.call_data).as_slice());
        expected.extend(word(op.call_gas));
        expected.extend(word(op.verification_gas));
        expected.extend(word(op.pre_verification_gas));
        expected.extend(word(op.max_fee_per_gas));
        expected.extend(word(op.max_priority_fee_per_gas));
        expected.extend(address_word(op.paymaster.unwrap()));
        expected.extend_from_slice(keccak256(&op.paymaster_data).as_slice());

        let packed = op.pack_for_hash();
        assert_eq!(packed.len(), PACKED_FOR_HASH_LEN);
        assert_eq!(packed.to_vec(), expected);
    }

    #[test]
    fn pack_for_hash_width_is_independent_of_payload() {
        let mut op = sample_op();
        op.call_data = vec![0xab; 4096].into();
        op.init_code = Bytes::new();
        op.paymaster = None;
        assert_eq!(op.pack_for_hash().len(), PACKED_FOR_HASH_LEN);
        assert_eq!(op.pack().len(), PACKED_FOR_HASH_LEN + 32);
    }

    #[test]
    fn absent_paymaster_packs_as_zero_address() {
        let mut op = sample_op();
        op.paymaster = None;
        let packed = op.pack_for_hash();
        assert_eq!(&packed[9 * 32..10 * 32], &[0u8; 32]);
    }

    #[test]
    fn signature_only_changes_full_pack() {
        let op = sample_op();
        let mut resigned = op.clone();
        resigned.signature = bytes!("01");
        assert_eq!(op.pack_for_hash(), resigned.pack_for_hash());
        assert_eq!(op.hash(), resigned.hash());
        assert_ne!(op.pack(), resigned.pack());
    }

    #[test]
    fn request_id_binds_entry_point_and_chain() {
        let op = sample_op();
        let entry_point = address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789");
        let other = address!("0000000000000000000000000000000000000001");

        let id = op.request_id(entry_point, 1);
        assert_eq!(id, op.request_id(entry_point, 1));
        assert_ne!(id, op.request_id(other, 1));
        assert_ne!(id, op.request_id(entry_point, 5));

        let mut preimage = Vec::new();
        preimage.extend_from_slice(op.hash().as_slice());
        preimage.extend(address_word(entry_point));
        preimage.extend(word(U256::from(1)));
        assert_eq!(id, keccak256(preimage));
    }

    #[test]
    fn every_field_changes_the_request_id() {
        let base = sample_op();
        let entry_point = Address::ZERO;
        let id = base.request_id(entry_point, 1);
        let mutations: Vec<fn(&mut UserOperation)> = vec![
            |op| op.sender = Address::repeat_byte(9),
            |op| op.nonce += U256::from(1),
            |op| op.init_code = bytes!("00"),
            |op| op.call_data = bytes!("00"),
            |op| op.call_gas += U256::from(1),
            |op| op.verification_gas += U256::from(1),
            |op| op.pre_verification_gas += U256::from(1),
            |op| op.max_fee_per_gas += U256::from(1),
            |op| op.max_priority_fee_per_gas += U256::from(1),
            |op| op.paymaster = None,
            |op| op.paymaster_data = bytes!("00"),
        ];
        for mutate in mutations {
            let mut op = base.clone();
            mutate(&mut op);
            assert_ne!(op.request_id(entry_point, 1), id);
        }
    }

    #[test]
    fn factory_and_entities() {
        let op = sample_op();
        assert_eq!(
            op.factory(),
            Some(address!("6942069420694206942069420694206942069420"))
        );
        assert!(op.factory_data().is_empty());
        assert_eq!(op.entities().len(), 3);

        let mut plain = op.clone();
        plain.init_code = Bytes::new();
        plain.paymaster = None;
        assert_eq!(plain.factory(), None);
        assert_eq!(plain.entities(), vec![Entity::account(op.sender)]);
    }

    #[test]
    fn required_prefund_reserves_paymaster_gas() {
        let mut op = sample_op();
        let price = U256::from(2);
        // 10_000 + 3 * 100_000 + 100
        assert_eq!(op.required_prefund(price), U256::from(310_100 * 2));
        op.paymaster = None;
        assert_eq!(op.required_prefund(price), U256::from(110_100 * 2));
    }

    #[test]
    fn gas_values_must_fit_128_bits() {
        let mut op = sample_op();
        assert!(op.gas_values_fit());
        op.call_gas = U256::from(u128::MAX) + U256::from(1);
        assert!(!op.gas_values_fit());
    }

    #[test]
    fn deserializes_camel_case_json() {
        let op: UserOperation = serde_json::from_str(
            r#"{
                "sender": "0x1306b01bc3e4ad202612d3843387e94737673f53",
                "nonce": "0x1",
                "callData": "0xdeadbeef",
                "callGas": "0x5208",
                "verificationGas": "0x186a0",
                "preVerificationGas": "0x0",
                "maxFeePerGas": "0x3b9aca00",
                "maxPriorityFeePerGas": "0x3b9aca00"
            }"#,
        )
        .unwrap();
        assert_eq!(op.nonce, U256::from(1));
        assert_eq!(op.call_gas, U256::from(21_000));
        assert_eq!(op.paymaster, None);
        assert!(op.signature.is_empty());
    }
}
