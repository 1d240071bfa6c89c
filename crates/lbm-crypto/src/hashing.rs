//! SHA-256 hashing.
//!
//! Every hash in the system — canonical-JSON digests, content addresses,
//! handshake transcripts — is plain SHA-256. There is no keyed or streaming
//! variant in use: inputs are small enough to hash in one shot.

use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Hash `data` with SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash `data` with SHA-256 and return the lowercase hex digest.
///
/// This is the canonical form used for content-addressed object names and
/// transaction/block hashes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(sha256(b"test"), sha256(b"test"));
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(sha256(b"a"), sha256(b"b"));
    }

    #[test]
    fn known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
