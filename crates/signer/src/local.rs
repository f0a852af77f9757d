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


use alloy_primitives::{keccak256, U256};
use alloy_signer_local::{LocalSignerError, PrivateKeySigner};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Parse a hex private key into a local signer
pub fn signer_from_private_key(private_key: &SecretString) -> Result<PrivateKeySigner> {
    Ok(private_key.expose_secret().parse::<PrivateKeySigner>()?)
}

/// A reproducible owner key derived from a counter: the private key is
/// `keccak256(counter)` over the counter's minimal big-endian bytes.
pub fn deterministic_signer(counter: u64) -> Result<PrivateKeySigner> {
    let seed = U256::from(counter).to_be_bytes_trimmed_vec();
    PrivateKeySigner::from_bytes(&keccak256(seed))
        .map_err(|e| Error::SigningError(e.to_string()))
}

impl From<LocalSignerError> for Error {
    fn from(value: LocalSignerError) -> Self {
        Error::SigningError(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_signers_are_stable_and_distinct() {
        let a = deterministic_signer(1).unwrap();
        let b = deterministic_signer(1).unwrap();
        let c = deterministic_signer(2).unwrap();
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn parses_hex_private_key() {
        let key = SecretString::from(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_string(),
        );
        let signer = signer_from_private_key(&key).unwrap();
        assert_eq!(
            signer.address().to_checksum(None),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );

        let bad = SecretString::from("0x1234".to_string());
        assert!(matches!(
            signer_from_private_key(&bad),
            Err(Error::SigningError(_))
        ));
    }
}
