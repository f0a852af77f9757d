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


use alloy_primitives::{Address, Bytes, Signature, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use settler_types::UserOperation;

use crate::{Error, Result};

/// Length of an `r || s || v` signature
pub const SIGNATURE_LEN: usize = 65;

/// Sign a request id as an EIP-191 personal message, returning `r || s || v` with
/// `v` in `{27, 28}`.
pub fn sign_request_id(signer: &PrivateKeySigner, request_id: B256) -> Result<Bytes> {
    let signature = signer.sign_message_sync(request_id.as_slice())?;
    Ok(Bytes::copy_from_slice(&signature.as_bytes()))
}

/// Return `op` with its signature set for the given coordinator and chain
pub fn sign_user_op(
    signer: &PrivateKeySigner,
    mut op: UserOperation,
    entry_point: Address,
    chain_id: u64,
) -> Result<UserOperation> {
    let request_id = op.request_id(entry_point, chain_id);
    op.signature = sign_request_id(signer, request_id)?;
    Ok(op)
}

/// Recover the address that signed `request_id`.
///
/// The signature must be exactly 65 bytes with a recovery byte of 0, 1, 27 or 28.
pub fn recover_signer(request_id: B256, signature: &[u8]) -> Result<Address> {
    if signature.len() != SIGNATURE_LEN {
        return Err(Error::InvalidSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }
    let v = signature[SIGNATURE_LEN - 1];
    if !matches!(v, 0 | 1 | 27 | 28) {
        return Err(Error::InvalidSignature(format!("invalid recovery byte {v}")));
    }
    let signature = Signature::from_raw(signature)?;
    Ok(signature.recover_address_from_msg(request_id.as_slice())?)
}

/// Whether `signature` over `request_id` was produced by `expected`.
///
/// A well-formed signature by someone else is `Ok(false)`; a malformed one is an error.
pub fn verify_signature(request_id: B256, signature: &[u8], expected: Address) -> Result<bool> {
    Ok(recover_signer(request_id, signature)? == expected)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, U256};

    use super::*;
    use crate::deterministic_signer;

    fn request_id() -> B256 {
        UserOperation {
            sender: address!("1306b01bc3e4ad202612d3843387e94737673f53"),
            nonce: U256::from(1),
            ..Default::default()
        }
        .request_id(address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789"), 1)
    }

    #[test]
    fn signature_recovers_to_signer() {
        let signer = deterministic_signer(1).unwrap();
        let id = request_id();
        let signature = sign_request_id(&signer, id).unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert!(matches!(signature[64], 27 | 28));
        assert_eq!(recover_signer(id, &signature).unwrap(), signer.address());
        assert!(verify_signature(id, &signature, signer.address()).unwrap());
    }

    #[test]
    fn signature_is_bound_to_request_id() {
        let signer = deterministic_signer(1).unwrap();
        let signature = sign_request_id(&signer, request_id()).unwrap();
        assert!(!verify_signature(B256::ZERO, &signature, signer.address()).unwrap());
    }

    #[test]
    fn other_signer_does_not_verify() {
        let owner = deterministic_signer(1).unwrap();
        let other = deterministic_signer(2).unwrap();
        let id = request_id();
        let signature = sign_request_id(&other, id).unwrap();
        assert!(!verify_signature(id, &signature, owner.address()).unwrap());
    }

    #[test]
    fn raw_recovery_byte_is_accepted() {
        let signer = deterministic_signer(3).unwrap();
        let id = request_id();
        let mut signature = sign_request_id(&signer, id).unwrap().to_vec();
        signature[64] -= 27;
        assert_eq!(recover_signer(id, &signature).unwrap(), signer.address());
    }

    #[test]
    fn malformed_signatures_are_errors() {
        let id = request_id();
        assert!(matches!(
            recover_signer(id, &[0u8; 64]),
            Err(Error::InvalidSignature(_))
        ));
        assert!(matches!(
            recover_signer(id, &[]),
            Err(Error::InvalidSignature(_))
        ));

        let signer = deterministic_signer(1).unwrap();
        let mut signature = sign_request_id(&signer, id).unwrap().to_vec();
        signature[64] = 35;
        assert!(matches!(
            verify_signature(id, &signature, signer.address()),
            Err(Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn signs_user_op_in_place() {
        let signer = deterministic_signer(4).unwrap();
        let entry_point = Address::repeat_byte(0xee);
        let op = sign_user_op(
            &signer,
            UserOperation {
                sender: Address::repeat_byte(1),
                ..Default::default()
            },
            entry_point,
            1337,
        )
        .unwrap();
        let id = op.request_id(entry_point, 1337);
        assert_eq!(recover_signer(id, &op.signature).unwrap(), signer.address());
    }
}
