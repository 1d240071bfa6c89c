//! HKDF-SHA256 key derivation.

use crate::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;

/// Derive `length` bytes of key material from `ikm` using HKDF-SHA256 with
/// the given salt and info.
///
/// Used to turn an X25519 shared secret into the pair of AEAD keys that seed
/// a secure-channel session.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|_| CryptoError::KeyGenerationFailed("hkdf expand length invalid".into()))?;
    Ok(okm)
}
