//! Client and server sides of the single-round-trip handshake.

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};

use lbm_crypto::agreement::{X25519KeyPair, X25519PublicKey};
use lbm_crypto::signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use lbm_crypto::{hkdf_sha256, sha256, sha256_hex};
use lbm_types::canonical::canonical_json;

use crate::error::ChannelError;
use crate::framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_BYTES};
use crate::messages::{Hello, Welcome, PROTOCOL_TAG};
use crate::session::SecureSession;

const MAX_CLOCK_DRIFT_MS: i64 = 5 * 60 * 1000;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn random_nonce_b64() -> String {
    use base64::Engine;
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    base64::engine::general_purpose::STANDARD.encode(buf)
}

fn check_drift(ts_ms: i64) -> Result<(), ChannelError> {
    let now = now_ms();
    if ts_ms > now + MAX_CLOCK_DRIFT_MS || ts_ms < now - MAX_CLOCK_DRIFT_MS {
        return Err(ChannelError::ClockDrift);
    }
    Ok(())
}

fn sign_message<T: serde::Serialize>(key: &Ed25519KeyPair, unsigned: &T) -> Result<String, ChannelError> {
    let bytes = canonical_json(unsigned)?;
    Ok(key.sign(&bytes).to_base64())
}

fn verify_message<T: serde::Serialize>(unsigned: &T, sign_pub_b64: &str, sig_b64: &str) -> Result<(), ChannelError> {
    let bytes = canonical_json(unsigned)?;
    let pubkey = Ed25519PublicKey::from_base64(sign_pub_b64).map_err(|_| ChannelError::BadSignature)?;
    let sig = Ed25519Signature::from_base64(sig_b64).map_err(|_| ChannelError::BadSignature)?;
    pubkey.verify(&bytes, &sig).map_err(|_| ChannelError::BadSignature)
}

fn derive_keys(shared: &[u8; 32], th: &[u8; 32]) -> Result<[u8; 64], ChannelError> {
    let km = hkdf_sha256(shared, th, PROTOCOL_TAG.as_bytes(), 64)?;
    Ok(km.try_into().expect("hkdf_sha256 returned 64 bytes"))
}

/// Run the client side of the handshake over an already-connected stream,
/// identifying this node with `sign_key`/`enc_pub`.
pub async fn client_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    sign_key: &Ed25519KeyPair,
    enc_key: &X25519KeyPair,
) -> Result<SecureSession, ChannelError> {
    let ephemeral = X25519KeyPair::generate();
    let mut hello = Hello::new(
        sign_key.public_key().to_base64(),
        enc_key.public_key().to_base64(),
        ephemeral.public_key().to_base64(),
        random_nonce_b64(),
        now_ms(),
    );
    hello.sig = Some(sign_message(sign_key, &hello.unsigned())?);
    let hello_bytes = canonical_json(&hello)?;
    write_frame(stream, &hello_bytes).await?;

    let welcome_bytes = read_frame(stream, DEFAULT_MAX_FRAME_BYTES).await?;
    let welcome: Welcome = serde_json::from_slice(&welcome_bytes)
        .map_err(|e| ChannelError::Malformed(format!("bad welcome: {e}")))?;
    if welcome.msg_type != "welcome" || welcome.v != PROTOCOL_TAG {
        return Err(ChannelError::Malformed("unexpected message type".into()));
    }
    let sig = welcome.sig.clone().ok_or_else(|| ChannelError::Malformed("welcome missing sig".into()))?;
    verify_message(&welcome.unsigned(), &welcome.sign_pub, &sig)?;
    check_drift(welcome.ts_ms)?;
    if welcome.hello_hash != sha256_hex(&hello_bytes) {
        return Err(ChannelError::HelloHashMismatch);
    }

    let peer_eph = X25519PublicKey::from_base64(&welcome.eph_pub).map_err(|_| ChannelError::BadSignature)?;
    let shared = ephemeral.exchange(&peer_eph);
    let th = sha256(&transcript(&hello_bytes, &welcome_bytes));
    let km = derive_keys(&shared, &th)?;

    let send_key: [u8; 32] = km[..32].try_into().unwrap();
    let recv_key: [u8; 32] = km[32..].try_into().unwrap();
    let prefix_c2s: [u8; 4] = th[..4].try_into().unwrap();
    let prefix_s2c: [u8; 4] = th[4..8].try_into().unwrap();

    Ok(SecureSession::new(welcome.sign_pub, welcome.enc_pub, send_key, recv_key, prefix_c2s, prefix_s2c))
}

/// Run the server side of the handshake over an accepted stream.
pub async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    sign_key: &Ed25519KeyPair,
    enc_key: &X25519KeyPair,
) -> Result<SecureSession, ChannelError> {
    let hello_bytes = read_frame(stream, DEFAULT_MAX_FRAME_BYTES).await?;
    let hello: Hello =
        serde_json::from_slice(&hello_bytes).map_err(|e| ChannelError::Malformed(format!("bad hello: {e}")))?;
    if hello.msg_type != "hello" || hello.v != PROTOCOL_TAG {
        return Err(ChannelError::Malformed("unexpected message type".into()));
    }
    let sig = hello.sig.clone().ok_or_else(|| ChannelError::Malformed("hello missing sig".into()))?;
    verify_message(&hello.unsigned(), &hello.sign_pub, &sig)?;
    check_drift(hello.ts_ms)?;

    let ephemeral = X25519KeyPair::generate();
    let mut welcome = Welcome::new(
        sign_key.public_key().to_base64(),
        enc_key.public_key().to_base64(),
        ephemeral.public_key().to_base64(),
        random_nonce_b64(),
        now_ms(),
        sha256_hex(&hello_bytes),
    );
    welcome.sig = Some(sign_message(sign_key, &welcome.unsigned())?);
    let welcome_bytes = canonical_json(&welcome)?;
    write_frame(stream, &welcome_bytes).await?;

    let peer_eph = X25519PublicKey::from_base64(&hello.eph_pub).map_err(|_| ChannelError::BadSignature)?;
    let shared = ephemeral.exchange(&peer_eph);
    let th = sha256(&transcript(&hello_bytes, &welcome_bytes));
    let km = derive_keys(&shared, &th)?;

    let recv_key: [u8; 32] = km[..32].try_into().unwrap();
    let send_key: [u8; 32] = km[32..].try_into().unwrap();
    let prefix_c2s: [u8; 4] = th[..4].try_into().unwrap();
    let prefix_s2c: [u8; 4] = th[4..8].try_into().unwrap();

    Ok(SecureSession::new(hello.sign_pub, hello.enc_pub, send_key, recv_key, prefix_s2c, prefix_c2s))
}

fn transcript(hello_bytes: &[u8], welcome_bytes: &[u8]) -> Vec<u8> {
    let mut t = Vec::with_capacity(hello_bytes.len() + 1 + welcome_bytes.len());
    t.extend_from_slice(hello_bytes);
    t.push(b'|');
    t.extend_from_slice(welcome_bytes);
    t
}
