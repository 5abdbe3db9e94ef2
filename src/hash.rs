//! Content-hashing primitives. BLAKE2b truncated to 8 bytes is the content
//! address used everywhere inside the store; SHA-256 is used only for the
//! source file fingerprint recorded in the source store.

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest as _};
use sha2::{Digest as Sha2Digest, Sha256};

type Blake2b64 = Blake2b<U8>;

/// BLAKE2b-64 of `bytes`, interpreted little-endian as a `u64`.
pub fn blake2b64(bytes: &[u8]) -> u64 {
    let mut hasher = Blake2b64::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    u64::from_le_bytes(digest.into())
}

/// SHA-256 of `bytes`, hex-encoded lowercase.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The hash of the unique empty blob: `parent_hash=0`, no moves, `result=3`.
/// Root of every chain.
pub fn init_blob_hash() -> u64 {
    // 64 zero bytes except the result field (offset 62..64) set to 3 (unknown/in-progress).
    let mut buf = [0u8; 64];
    buf[62] = 3;
    buf[63] = 0;
    blake2b64(&buf)
}

/// BLAKE2b-64 of the ASCII marker string. Reserved chain terminator for
/// detached variation parents; never produced by ingestion, only
/// recognised as a terminator by the reconstructor and verifier.
pub fn orphan_parent_hash() -> u64 {
    blake2b64(b"ORPHAN_VARIATION_PARENT_MARKER")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_blob_hash_is_stable() {
        assert_eq!(init_blob_hash(), init_blob_hash());
        assert_ne!(init_blob_hash(), orphan_parent_hash());
    }

    #[test]
    fn blake2b64_is_deterministic_and_sensitive() {
        assert_eq!(blake2b64(b"abc"), blake2b64(b"abc"));
        assert_ne!(blake2b64(b"abc"), blake2b64(b"abd"));
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        // echo -n "abc" | sha256sum
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
