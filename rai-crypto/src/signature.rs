// rai-crypto/src/signature.rs

use blake2::Blake2b512;
use ed25519_dalek::hazmat::raw_verify;
use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::{RaiKeyPair, PUBLIC_KEY_LENGTH};

/// Length of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;

pub fn sign_message(keypair: &RaiKeyPair, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    keypair.sign(message)
}

/// Checks `signature` over `message` for the account `public_key`.
pub fn verify_signature(
    public_key: &[u8; PUBLIC_KEY_LENGTH],
    message: &[u8],
    signature: &[u8; SIGNATURE_LENGTH],
) -> CryptoResult<()> {
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let signature = Signature::from_bytes(signature);
    raw_verify::<Blake2b512>(&verifying_key, message, &signature).map_err(|_| {
        log::trace!("Signature rejected for {}", hex::encode_upper(public_key));
        CryptoError::InvalidSignature
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flipped_bit_rejected() {
        let keypair = RaiKeyPair::from_private_key([3u8; 32]);
        let mut signature = sign_message(&keypair, b"payload");
        verify_signature(&keypair.public_key(), b"payload", &signature).unwrap();

        signature[10] ^= 0x01;
        assert_eq!(
            verify_signature(&keypair.public_key(), b"payload", &signature),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_account_rejected() {
        let signer = RaiKeyPair::from_private_key([3u8; 32]);
        let other = RaiKeyPair::from_private_key([4u8; 32]);
        let signature = sign_message(&signer, b"payload");
        assert!(verify_signature(&other.public_key(), b"payload", &signature).is_err());
    }
}
