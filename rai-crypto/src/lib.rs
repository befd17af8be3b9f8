//! Cryptographic primitives for the RaiBlocks light peer.
//!
//! The ledger hashes with Blake2b and signs with Ed25519 where SHA-512 is
//! replaced by Blake2b-512, so nothing here is interchangeable with stock
//! Ed25519 keys.

pub mod error;
pub mod hash;
pub mod keypair;
pub mod signature;

pub use error::{CryptoError, CryptoResult};
pub use hash::{blake2b_256, Blake2b256, HASH_LENGTH};
pub use keypair::{RaiKeyPair, PRIVATE_KEY_LENGTH, PUBLIC_KEY_LENGTH};
pub use signature::{sign_message, verify_signature, SIGNATURE_LENGTH};
