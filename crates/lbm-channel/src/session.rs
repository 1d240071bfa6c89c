//! The post-handshake AEAD record stream.

use lbm_crypto::{aead_decrypt, aead_encrypt};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ChannelError;
use crate::messages::PROTOCOL_TAG;

fn aad_for(counter: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(PROTOCOL_TAG.len() + 1 + 8);
    aad.extend_from_slice(PROTOCOL_TAG.as_bytes());
    aad.push(b'|');
    aad.extend_from_slice(&counter.to_be_bytes());
    aad
}

fn nonce_for(prefix: [u8; 4], counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(&prefix);
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// A live, key-derived secure channel. Every record is sealed/opened with a
/// strictly monotonic per-direction counter; a gap on receive ends the
/// session (the caller should drop the underlying stream).
pub struct SecureSession {
    /// Peer's long-lived Ed25519 signing public key (base64), established
    /// and verified during the handshake.
    pub peer_sign_pub: String,
    /// Peer's long-lived X25519 encryption public key (base64).
    pub peer_enc_pub: String,
    send_key: [u8; 32],
    recv_key: [u8; 32],
    nonce_prefix_send: [u8; 4],
    nonce_prefix_recv: [u8; 4],
    send_ctr: u64,
    recv_ctr: u64,
}

impl SecureSession {
    pub(crate) fn new(
        peer_sign_pub: String,
        peer_enc_pub: String,
        send_key: [u8; 32],
        recv_key: [u8; 32],
        nonce_prefix_send: [u8; 4],
        nonce_prefix_recv: [u8; 4],
    ) -> Self {
        Self {
            peer_sign_pub,
            peer_enc_pub,
            send_key,
            recv_key,
            nonce_prefix_send,
            nonce_prefix_recv,
            send_ctr: 0,
            recv_ctr: 0,
        }
    }

    /// Canonicalize, encrypt, and envelope `value` as one record's wire bytes.
    pub fn seal<T: Serialize>(&mut self, value: &T) -> Result<Vec<u8>, ChannelError> {
        let plaintext = lbm_types::canonical::canonical_json(value)?;
        let ctr = self.send_ctr;
        self.send_ctr += 1;
        let nonce = nonce_for(self.nonce_prefix_send, ctr);
        let aad = aad_for(ctr);
        let ct = aead_encrypt(&self.send_key, &nonce, &plaintext, &aad)?;

        #[derive(Serialize)]
        struct Envelope {
            ctr: u64,
            ct: String,
        }
        let envelope = Envelope { ctr, ct: base64_encode(&ct) };
        Ok(lbm_types::canonical::canonical_json(&envelope)?)
    }

    /// Decrypt and decode one record's wire bytes into `T`. Rejects any
    /// counter other than the exact expected next value.
    pub fn open<T: DeserializeOwned>(&mut self, envelope_bytes: &[u8]) -> Result<T, ChannelError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            ctr: u64,
            ct: String,
        }
        let envelope: Envelope = serde_json::from_slice(envelope_bytes)
            .map_err(|e| ChannelError::Malformed(format!("bad record envelope: {e}")))?;

        if envelope.ctr != self.recv_ctr {
            return Err(ChannelError::CounterGap { expected: self.recv_ctr, actual: envelope.ctr });
        }
        self.recv_ctr += 1;

        let ct = base64_decode(&envelope.ct)
            .map_err(|e| ChannelError::Malformed(format!("bad ciphertext encoding: {e}")))?;
        let nonce = nonce_for(self.nonce_prefix_recv, envelope.ctr);
        let aad = aad_for(envelope.ctr);
        let plaintext = aead_decrypt(&self.recv_key, &nonce, &ct, &aad)?;

        serde_json::from_slice(&plaintext).map_err(|e| ChannelError::Malformed(format!("bad record payload: {e}")))
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paired_sessions() -> (SecureSession, SecureSession) {
        let km = [7u8; 64];
        let send_key: [u8; 32] = km[..32].try_into().unwrap();
        let recv_key: [u8; 32] = km[32..].try_into().unwrap();
        let prefix_a = [1u8, 2, 3, 4];
        let prefix_b = [5u8, 6, 7, 8];
        let a = SecureSession::new("a".into(), "a-enc".into(), send_key, recv_key, prefix_a, prefix_b);
        let b = SecureSession::new("b".into(), "b-enc".into(), recv_key, send_key, prefix_b, prefix_a);
        (a, b)
    }

    #[test]
    fn seal_open_roundtrip() {
        let (mut a, mut b) = paired_sessions();
        let env = a.seal(&json!({"method": "ping"})).unwrap();
        let value: serde_json::Value = b.open(&env).unwrap();
        assert_eq!(value["method"], "ping");
    }

    #[test]
    fn counters_must_be_exact() {
        let (mut a, mut b) = paired_sessions();
        let env1 = a.seal(&json!({"n": 1})).unwrap();
        let _env2 = a.seal(&json!({"n": 2})).unwrap();
        // b never opened env1; feeding env2 next should fail on the gap.
        let env2_again = a.seal(&json!({"n": 3})).unwrap();
        let _: serde_json::Value = b.open(&env1).unwrap();
        let err = b.open::<serde_json::Value>(&env2_again).unwrap_err();
        assert!(matches!(err, ChannelError::CounterGap { .. }));
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let (mut a, mut b) = paired_sessions();
        let env = a.seal(&json!({"n": 1})).unwrap();
        let mut tampered: serde_json::Value = serde_json::from_slice(&env).unwrap();
        tampered["ct"] = json!("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==");
        let bytes = serde_json::to_vec(&tampered).unwrap();
        assert!(b.open::<serde_json::Value>(&bytes).is_err());
    }
}
