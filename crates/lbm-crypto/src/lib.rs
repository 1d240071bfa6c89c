//! Cryptographic primitives shared by every LBM crate.
//!
//! | Module | Algorithm | Use |
//! |---|---|---|
//! | `hashing` | SHA-256 | canonical-JSON hashing, content addressing |
//! | `signatures` | Ed25519 | node identity, block/handshake signing |
//! | `agreement` | X25519 | secure-channel key exchange |
//! | `kdf` | HKDF-SHA256 | session key derivation |
//! | `symmetric` | ChaCha20-Poly1305 | AEAD records and sealed packages |
//! | `keyfile` | scrypt + ChaCha20-Poly1305 | password-at-rest key encryption |

#![warn(missing_docs)]

pub mod agreement;
pub mod errors;
pub mod hashing;
pub mod kdf;
pub mod keyfile;
pub mod signatures;
pub mod symmetric;

pub use agreement::{X25519KeyPair, X25519PublicKey};
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_hex, Hash};
pub use kdf::hkdf_sha256;
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use symmetric::{aead_decrypt, aead_encrypt};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
