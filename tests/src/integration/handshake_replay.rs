//! Crafts handshake messages by hand (bypassing `client_handshake`'s helper)
//! to confirm the server rejects a stale timestamp and a tampered signature
//! over a real duplex stream, rather than relying on the honest client path.

use base64::Engine;
use rand::RngCore;

use lbm_channel::handshake::server_handshake;
use lbm_channel::messages::Hello;
use lbm_crypto::agreement::X25519KeyPair;
use lbm_crypto::signatures::Ed25519KeyPair;
use lbm_types::canonical::canonical_json;

fn random_nonce_b64() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    base64::engine::general_purpose::STANDARD.encode(buf)
}

#[tokio::test]
async fn server_rejects_a_hello_with_stale_timestamp() {
    let client_sign = Ed25519KeyPair::generate();
    let client_enc = X25519KeyPair::generate();
    let server_sign = Ed25519KeyPair::generate();
    let server_enc = X25519KeyPair::generate();

    let ephemeral = X25519KeyPair::generate();
    let stale_ts_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
        - 10 * 60 * 1000; // 10 minutes ago, outside the 5 minute drift window

    let mut hello = Hello::new(
        client_sign.public_key().to_base64(),
        client_enc.public_key().to_base64(),
        ephemeral.public_key().to_base64(),
        random_nonce_b64(),
        stale_ts_ms,
    );
    let unsigned_bytes = canonical_json(&hello.unsigned()).unwrap();
    hello.sig = Some(client_sign.sign(&unsigned_bytes).to_base64());

    let (mut client_stream, mut server_stream) = tokio::io::duplex(64 * 1024);
    let hello_bytes = canonical_json(&hello).unwrap();

    let client_fut = lbm_channel::write_frame(&mut client_stream, &hello_bytes);
    let server_fut = server_handshake(&mut server_stream, &server_sign, &server_enc);
    let (write_result, handshake_result) = tokio::join!(client_fut, server_fut);

    write_result.unwrap();
    assert!(handshake_result.is_err());
}

#[tokio::test]
async fn server_rejects_a_hello_with_a_tampered_field() {
    let client_sign = Ed25519KeyPair::generate();
    let client_enc = X25519KeyPair::generate();
    let server_sign = Ed25519KeyPair::generate();
    let server_enc = X25519KeyPair::generate();

    let ephemeral = X25519KeyPair::generate();
    let now_ms =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as i64;

    let mut hello = Hello::new(
        client_sign.public_key().to_base64(),
        client_enc.public_key().to_base64(),
        ephemeral.public_key().to_base64(),
        random_nonce_b64(),
        now_ms,
    );
    let unsigned_bytes = canonical_json(&hello.unsigned()).unwrap();
    hello.sig = Some(client_sign.sign(&unsigned_bytes).to_base64());

    // Swap in a different ephemeral public key after signing — the server
    // verifies the signature over the received fields, so this must fail.
    hello.eph_pub = X25519KeyPair::generate().public_key().to_base64();

    let (mut client_stream, mut server_stream) = tokio::io::duplex(64 * 1024);
    let hello_bytes = canonical_json(&hello).unwrap();

    let client_fut = lbm_channel::write_frame(&mut client_stream, &hello_bytes);
    let server_fut = server_handshake(&mut server_stream, &server_sign, &server_enc);
    let (write_result, handshake_result) = tokio::join!(client_fut, server_fut);

    write_result.unwrap();
    assert!(handshake_result.is_err());
}
