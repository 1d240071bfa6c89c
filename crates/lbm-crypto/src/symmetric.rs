//! ChaCha20-Poly1305 AEAD, and the higher-level sealed-box / encrypted
//! package formats built on top of it.

use crate::{agreement::X25519KeyPair, hkdf_sha256, CryptoError, X25519PublicKey};
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::{Deserialize, Serialize};

fn b64() -> base64::engine::general_purpose::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Encrypt `plaintext` under `key` with the standard 12-byte ChaCha20-Poly1305
/// nonce and the given associated data.
///
/// `key` and `nonce` must each be exactly 32 and 12 bytes.
pub fn aead_encrypt(
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let key: &[u8; 32] = key
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength { expected: 32, actual: key.len() })?;
    let nonce: &[u8; 12] = nonce
        .try_into()
        .map_err(|_| CryptoError::InvalidNonceLength { expected: 12, actual: nonce.len() })?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            chacha20poly1305::aead::Payload { msg: plaintext, aad },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Decrypt a ciphertext produced by [`aead_encrypt`].
pub fn aead_decrypt(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let key: &[u8; 32] = key
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength { expected: 32, actual: key.len() })?;
    let nonce: &[u8; 12] = nonce
        .try_into()
        .map_err(|_| CryptoError::InvalidNonceLength { expected: 12, actual: nonce.len() })?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            chacha20poly1305::aead::Payload { msg: ciphertext, aad },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut out);
    out
}

/// Wire format of an anonymously-sealed box, addressed to a recipient's
/// long-lived X25519 public key. Used where the sender need not be
/// authenticated at the crypto layer; membership and signature checks
/// happen above this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBox {
    /// Base64 ephemeral public key used for this seal.
    pub epk: String,
    /// Base64 HKDF salt (32 random bytes).
    pub salt: String,
    /// Base64 12-byte AEAD nonce.
    pub nonce: String,
    /// Base64 ciphertext.
    pub ct: String,
}

/// Seal `plaintext` to `recipient_pub` using an ephemeral X25519 key, HKDF
/// and ChaCha20-Poly1305. `context` is mixed into the HKDF info parameter so
/// sealed boxes cannot be replayed across unrelated protocol contexts.
pub fn seal_to_x25519(
    recipient_pub: &X25519PublicKey,
    plaintext: &[u8],
    context: &[u8],
) -> Result<SealedBox, CryptoError> {
    let ephemeral = X25519KeyPair::generate();
    let shared = ephemeral.exchange(recipient_pub);
    let salt = random_bytes::<32>();
    let key = hkdf_sha256(&shared, &salt, context, 32)?;
    let nonce = random_bytes::<12>();
    let ct = aead_encrypt(&key, &nonce, plaintext, b"")?;

    Ok(SealedBox {
        epk: ephemeral.public_key().to_base64(),
        salt: b64().encode(salt),
        nonce: b64().encode(nonce),
        ct: b64().encode(ct),
    })
}

/// Open a box produced by [`seal_to_x25519`].
pub fn open_from_x25519(
    recipient_priv: &X25519KeyPair,
    sealed: &SealedBox,
    context: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let epk = X25519PublicKey::from_base64(&sealed.epk)?;
    let shared = recipient_priv.exchange(&epk);
    let salt = b64()
        .decode(&sealed.salt)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    let key = hkdf_sha256(&shared, &salt, context, 32)?;
    let nonce = b64()
        .decode(&sealed.nonce)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    let ct = b64()
        .decode(&sealed.ct)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    aead_decrypt(&key, &nonce, &ct, b"")
}

/// Wire format of a symmetric encrypted-package envelope (used for offered
/// knowledge packages): a self-describing JSON object, versioned so future
/// ciphers can be introduced without breaking old envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPackage {
    /// Base64 associated data (empty string if none was supplied).
    pub aad: String,
    /// Cipher identifier, currently always `"chacha20poly1305"`.
    pub cipher: String,
    /// Base64 ciphertext.
    pub ct: String,
    /// Base64 12-byte nonce.
    pub nonce: String,
    /// Envelope format version. Always 1 today.
    pub v: u32,
}

/// Encrypt `plaintext` into an [`EncryptedPackage`]. If `key` is `None` a
/// random 32-byte key is generated and returned alongside the envelope bytes
/// — this is the "generate a fresh key per package, hand the key to the
/// buyer out of band" flow used by `offer_purchase`.
pub fn encrypt_package(
    plaintext: &[u8],
    key: Option<[u8; 32]>,
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; 32]), CryptoError> {
    let key = key.unwrap_or_else(random_bytes::<32>);
    let nonce = random_bytes::<12>();
    let ct = aead_encrypt(&key, &nonce, plaintext, aad)?;

    let envelope = EncryptedPackage {
        aad: b64().encode(aad),
        cipher: "chacha20poly1305".to_string(),
        ct: b64().encode(ct),
        nonce: b64().encode(nonce),
        v: 1,
    };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    Ok((bytes, key))
}

/// Decrypt an [`EncryptedPackage`]'s JSON bytes with `key`.
pub fn decrypt_package(envelope_bytes: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let envelope: EncryptedPackage = serde_json::from_slice(envelope_bytes)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    if envelope.v != 1 || envelope.cipher != "chacha20poly1305" {
        return Err(CryptoError::InvalidInput("unsupported package envelope".into()));
    }
    let nonce = b64()
        .decode(&envelope.nonce)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    let ct = b64()
        .decode(&envelope.ct)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    let aad = b64()
        .decode(&envelope.aad)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    aead_decrypt(key, &nonce, &ct, &aad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_roundtrip() {
        let key = random_bytes::<32>();
        let nonce = random_bytes::<12>();
        let pt = b"hello secure world";
        let ct = aead_encrypt(&key, &nonce, pt, b"aad").unwrap();
        let back = aead_decrypt(&key, &nonce, &ct, b"aad").unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn aead_wrong_aad_fails() {
        let key = random_bytes::<32>();
        let nonce = random_bytes::<12>();
        let ct = aead_encrypt(&key, &nonce, b"pt", b"aad1").unwrap();
        assert!(aead_decrypt(&key, &nonce, &ct, b"aad2").is_err());
    }

    #[test]
    fn sealed_box_roundtrip() {
        let recipient = X25519KeyPair::generate();
        let sealed = seal_to_x25519(&recipient.public_key(), b"secret", b"ctx").unwrap();
        let opened = open_from_x25519(&recipient, &sealed, b"ctx").unwrap();
        assert_eq!(opened, b"secret");
    }

    #[test]
    fn sealed_box_wrong_context_fails() {
        let recipient = X25519KeyPair::generate();
        let sealed = seal_to_x25519(&recipient.public_key(), b"secret", b"ctx1").unwrap();
        assert!(open_from_x25519(&recipient, &sealed, b"ctx2").is_err());
    }

    #[test]
    fn encrypted_package_roundtrip() {
        let (bytes, key) = encrypt_package(b"package contents", None, b"").unwrap();
        let plaintext = decrypt_package(&bytes, &key).unwrap();
        assert_eq!(plaintext, b"package contents");
    }

    #[test]
    fn encrypted_package_wrong_key_fails() {
        let (bytes, _key) = encrypt_package(b"package contents", None, b"").unwrap();
        let wrong = random_bytes::<32>();
        assert!(decrypt_package(&bytes, &wrong).is_err());
    }
}
