//! Load-or-generate the node's long-lived signing and key-agreement
//! identities, with optional password-at-rest encryption (§2 "Keystore").

use std::path::Path;

use lbm_crypto::agreement::X25519KeyPair;
use lbm_crypto::keyfile::{decrypt_key_file, encrypt_key_file, is_encrypted};
use lbm_crypto::signatures::Ed25519KeyPair;
use lbm_wal::fs::{atomic_write_bytes, ensure_dir};

use crate::container::NodeSettings;

/// Environment variable holding the keystore password, if set. Absent means
/// keys are written and read as raw, unencrypted bytes.
const KEY_PASSWORD_ENV: &str = "LB_KEY_PASSWORD";

fn read_or_generate(path: &Path, password: Option<&[u8]>, generate_seed: impl FnOnce() -> [u8; 32]) -> std::io::Result<[u8; 32]> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        let raw = if is_encrypted(&bytes) {
            let password = password.ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "key file is encrypted but no password was provided")
            })?;
            decrypt_key_file(&bytes, password)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?
        } else {
            bytes
        };
        let arr: [u8; 32] = raw
            .try_into()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "key file is not 32 bytes"))?;
        Ok(arr)
    } else {
        let seed = generate_seed();
        let out_bytes = match password {
            Some(pw) => encrypt_key_file(&seed, pw)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?,
            None => seed.to_vec(),
        };
        ensure_dir(path.parent().unwrap_or_else(|| Path::new(".")))?;
        atomic_write_bytes(path, &out_bytes)?;
        Ok(seed)
    }
}

/// Load this node's identity keypairs from `settings.keys_dir()`, generating
/// and persisting fresh ones on first run.
pub fn load_or_generate_keys(settings: &NodeSettings) -> std::io::Result<(Ed25519KeyPair, X25519KeyPair)> {
    let password = std::env::var(KEY_PASSWORD_ENV).ok();
    let password_bytes = password.as_deref().map(|s| s.as_bytes());

    let keys_dir = settings.keys_dir();
    ensure_dir(&keys_dir)?;

    let sign_seed = read_or_generate(&keys_dir.join("signing.key"), password_bytes, || Ed25519KeyPair::generate().to_seed())?;
    let enc_seed = read_or_generate(&keys_dir.join("encryption.key"), password_bytes, || X25519KeyPair::generate().to_bytes())?;

    Ok((Ed25519KeyPair::from_seed(sign_seed), X25519KeyPair::from_bytes(enc_seed)))
}
