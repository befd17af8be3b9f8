//! Blake2b hashing used for block and vote digests.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// Length in bytes of every ledger digest.
pub const HASH_LENGTH: usize = 32;

/// Blake2b configured for a 32-byte output.
pub type Blake2b256 = Blake2b<U32>;

/// Hashes the concatenation of `parts` with Blake2b-256.
///
/// Parts are fed to the hasher in order, so
/// `blake2b_256(&[a, b]) == blake2b_256(&[&[a, b].concat()])`.
pub fn blake2b_256(parts: &[&[u8]]) -> [u8; HASH_LENGTH] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
