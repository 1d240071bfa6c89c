//! Handshake message shapes.

use serde::{Deserialize, Serialize};

/// Protocol tag carried in every handshake message and folded into the AAD
/// and HKDF info of every AEAD record.
pub const PROTOCOL_TAG: &str = "lb-p2p-v1";

/// `client -> server` handshake message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    #[serde(rename = "type")]
    pub(crate) msg_type: String,
    pub(crate) v: String,
    /// Client's long-lived Ed25519 signing public key (base64).
    pub sign_pub: String,
    /// Client's long-lived X25519 encryption public key (base64).
    pub enc_pub: String,
    /// Fresh per-handshake X25519 ephemeral public key (base64).
    pub eph_pub: String,
    /// 32 bytes of random nonce (base64), unused beyond binding freshness.
    pub nonce: String,
    /// Unix milliseconds at send time.
    pub ts_ms: i64,
    /// Base64 Ed25519 signature over the canonicalization of every other field.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sig: Option<String>,
}

impl Hello {
    /// Build an unsigned hello; caller signs and sets `sig`.
    pub fn new(sign_pub: String, enc_pub: String, eph_pub: String, nonce: String, ts_ms: i64) -> Self {
        Self { msg_type: "hello".to_string(), v: PROTOCOL_TAG.to_string(), sign_pub, enc_pub, eph_pub, nonce, ts_ms, sig: None }
    }

    /// This message with `sig` cleared — the exact bytes a signature covers.
    pub fn unsigned(&self) -> Self {
        let mut m = self.clone();
        m.sig = None;
        m
    }
}

/// `server -> client` handshake message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Welcome {
    #[serde(rename = "type")]
    pub(crate) msg_type: String,
    pub(crate) v: String,
    /// Server's long-lived Ed25519 signing public key (base64).
    pub sign_pub: String,
    /// Server's long-lived X25519 encryption public key (base64).
    pub enc_pub: String,
    /// Fresh per-handshake X25519 ephemeral public key (base64).
    pub eph_pub: String,
    /// 32 bytes of random nonce (base64).
    pub nonce: String,
    /// Unix milliseconds at send time.
    pub ts_ms: i64,
    /// SHA-256 hex digest of the exact wire bytes of the received hello frame.
    pub hello_hash: String,
    /// Base64 Ed25519 signature over the canonicalization of every other field.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sig: Option<String>,
}

impl Welcome {
    /// Build an unsigned welcome; caller signs and sets `sig`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sign_pub: String,
        enc_pub: String,
        eph_pub: String,
        nonce: String,
        ts_ms: i64,
        hello_hash: String,
    ) -> Self {
        Self {
            msg_type: "welcome".to_string(),
            v: PROTOCOL_TAG.to_string(),
            sign_pub,
            enc_pub,
            eph_pub,
            nonce,
            ts_ms,
            hello_hash,
            sig: None,
        }
    }

    /// This message with `sig` cleared — the exact bytes a signature covers.
    pub fn unsigned(&self) -> Self {
        let mut m = self.clone();
        m.sig = None;
        m
    }
}
