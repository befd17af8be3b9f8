//! Key pair handling for ledger accounts.

use blake2::{Blake2b512, Digest};
use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
use ed25519_dalek::VerifyingKey;
use rand_core::{OsRng, RngCore};

use crate::error::{CryptoError, CryptoResult};
use crate::signature::SIGNATURE_LENGTH;

/// Length of a raw private key.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Length of an account public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// An account key pair.
///
/// The secret scalar is expanded with Blake2b-512 instead of SHA-512, and
/// the same digest is used when signing.
#[derive(Clone)]
pub struct RaiKeyPair {
    private_key: [u8; PRIVATE_KEY_LENGTH],
    public: VerifyingKey,
}

impl RaiKeyPair {
    /// Generates a new random key pair.
    pub fn generate() -> Self {
        let mut private_key = [0u8; PRIVATE_KEY_LENGTH];
        OsRng.fill_bytes(&mut private_key);
        Self::from_private_key(private_key)
    }

    /// Builds the key pair for a raw 32-byte private key.
    pub fn from_private_key(private_key: [u8; PRIVATE_KEY_LENGTH]) -> Self {
        let public = VerifyingKey::from(&Self::expand(&private_key));
        RaiKeyPair { private_key, public }
    }

    /// Parses a 64-character hex private key.
    pub fn from_hex(private_key: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(private_key)?;
        let private_key: [u8; PRIVATE_KEY_LENGTH] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PRIVATE_KEY_LENGTH,
                    actual: bytes.len(),
                })?;
        Ok(Self::from_private_key(private_key))
    }

    /// Returns the account public key.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.public.to_bytes()
    }

    /// Returns the raw private key.
    pub fn private_key(&self) -> &[u8; PRIVATE_KEY_LENGTH] {
        &self.private_key
    }

    /// Signs `message` with the secret key.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        let expanded = Self::expand(&self.private_key);
        raw_sign::<Blake2b512>(&expanded, message, &self.public).to_bytes()
    }

    fn expand(private_key: &[u8; PRIVATE_KEY_LENGTH]) -> ExpandedSecretKey {
        let mut digest = [0u8; 64];
        digest.copy_from_slice(&Blake2b512::digest(private_key));
        ExpandedSecretKey::from_bytes(&digest)
    }
}

impl std::fmt::Debug for RaiKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaiKeyPair")
            .field("public", &hex::encode_upper(self.public_key()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::verify_signature;

    #[test]
    fn test_same_private_key_same_account() {
        let a = RaiKeyPair::from_private_key([7u8; 32]);
        let b = RaiKeyPair::from_private_key([7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), RaiKeyPair::from_private_key([8u8; 32]).public_key());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = RaiKeyPair::generate();
        let signature = keypair.sign(b"block hash");
        assert!(verify_signature(&keypair.public_key(), b"block hash", &signature).is_ok());
        assert!(verify_signature(&keypair.public_key(), b"other hash", &signature).is_err());
    }

    #[test]
    fn test_from_hex() {
        let keypair = RaiKeyPair::from_hex(&"01".repeat(32)).unwrap();
        assert_eq!(keypair.private_key(), &[1u8; 32]);

        let err = RaiKeyPair::from_hex("0102").unwrap_err();
        assert_eq!(err, CryptoError::InvalidKeyLength { expected: 32, actual: 2 });
        assert!(matches!(RaiKeyPair::from_hex("zz"), Err(CryptoError::InvalidHex(_))));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let keypair = RaiKeyPair::from_private_key([0xAB; 32]);
        let printed = format!("{:?}", keypair);
        assert!(!printed.contains(&"AB".repeat(32)));
        assert!(!printed.contains(&"ab".repeat(32)));
    }
}
