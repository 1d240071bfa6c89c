//! X25519 Diffie-Hellman key agreement.
//!
//! Used only for the secure-channel handshake: each node carries one
//! long-lived X25519 identity keypair plus an ephemeral one generated per
//! handshake.

use crate::CryptoError;
use base64::Engine;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

fn b64() -> base64::engine::general_purpose::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// X25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct X25519PublicKey([u8; 32]);

impl X25519PublicKey {
    /// Wrap raw bytes. X25519 accepts any 32-byte string as a public key.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical base64 identifier.
    pub fn to_base64(&self) -> String {
        b64().encode(self.0)
    }

    /// Parse from the canonical base64 identifier.
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let raw = b64()
            .decode(s)
            .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
        let arr: [u8; 32] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidInput("public key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

/// X25519 keypair used for key agreement (handshake ECDH).
#[derive(Clone)]
pub struct X25519KeyPair {
    secret: StaticSecret,
}

impl X25519KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(rand::rngs::OsRng),
        }
    }

    /// Reconstruct from a raw 32-byte scalar.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// Secret scalar bytes, for serialization into the node's key file.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Public key corresponding to this secret.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(PublicKey::from(&self.secret).to_bytes())
    }

    /// Perform Diffie-Hellman with a peer's public key, producing the raw
    /// 32-byte shared secret. Callers must run this through a KDF before
    /// using it as key material.
    pub fn exchange(&self, peer: &X25519PublicKey) -> [u8; 32] {
        let peer_pub = PublicKey::from(peer.0);
        self.secret.diffie_hellman(&peer_pub).to_bytes()
    }
}

impl Drop for X25519KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.secret.to_bytes();
        bytes.zeroize();
    }
}
