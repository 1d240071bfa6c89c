//! Password-at-rest key file encryption.
//!
//! Format: `LBK1` magic (4 bytes) + 16-byte scrypt salt + 12-byte AEAD nonce
//! + ChaCha20-Poly1305 ciphertext, with AAD = `magic ‖ salt`. A file whose
//! first four bytes are not `LBK1` is treated as a raw, unencrypted 32-byte
//! key (backward compatibility with nodes that never set a password).

use crate::{symmetric, CryptoError};
use scrypt::Params;

const MAGIC: &[u8; 4] = b"LBK1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SCRYPT_LOG_N: u8 = 15; // N = 2^15
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> Result<[u8; 32], CryptoError> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
    let mut out = [0u8; 32];
    scrypt::scrypt(password, salt, &params, &mut out)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
    Ok(out)
}

/// Encrypt `raw_key` under `password`, producing the on-disk `LBK1` format.
pub fn encrypt_key_file(raw_key: &[u8], password: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);

    let key = derive_key(password, &salt)?;
    let mut aad = Vec::with_capacity(MAGIC.len() + SALT_LEN);
    aad.extend_from_slice(MAGIC);
    aad.extend_from_slice(&salt);

    let ct = symmetric::aead_encrypt(&key, &nonce, raw_key, &aad)?;

    let mut out = Vec::with_capacity(aad.len() + NONCE_LEN + ct.len());
    out.extend_from_slice(&aad);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Decrypt a key file produced by [`encrypt_key_file`].
pub fn decrypt_key_file(file_bytes: &[u8], password: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if file_bytes.len() < MAGIC.len() + SALT_LEN + NONCE_LEN {
        return Err(CryptoError::BadKeyFile("file too short".into()));
    }
    let (aad, rest) = file_bytes.split_at(MAGIC.len() + SALT_LEN);
    let (nonce, ct) = rest.split_at(NONCE_LEN);
    let salt: [u8; SALT_LEN] = aad[MAGIC.len()..].try_into().unwrap();

    let key = derive_key(password, &salt)?;
    symmetric::aead_decrypt(&key, nonce, ct, aad).map_err(|_| CryptoError::WrongPassword)
}

/// Is `file_bytes` in the encrypted `LBK1` format, or a raw key?
pub fn is_encrypted(file_bytes: &[u8]) -> bool {
    file_bytes.len() >= MAGIC.len() && &file_bytes[..MAGIC.len()] == MAGIC
}
