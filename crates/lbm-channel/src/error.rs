//! Secure-channel error type.

use thiserror::Error;

/// Any failure terminates the session immediately — there is no partial
/// recovery from a bad handshake or a broken record stream.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Underlying stream I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame's declared length exceeded the configured cap.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
    /// A frame or handshake message could not be parsed.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// The peer's Ed25519 signature did not verify.
    #[error("bad signature")]
    BadSignature,
    /// A handshake timestamp was outside the allowed clock drift.
    #[error("clock drift too large")]
    ClockDrift,
    /// `welcome.hello_hash` did not match the client's sent hello bytes.
    #[error("hello hash mismatch")]
    HelloHashMismatch,
    /// An AEAD record's counter was not exactly the expected next value.
    #[error("counter gap: expected {expected}, got {actual}")]
    CounterGap {
        /// Counter value the receiver expected next.
        expected: u64,
        /// Counter value the record actually carried.
        actual: u64,
    },
    /// A cryptographic primitive failed (bad key agreement, AEAD auth failure, ...).
    #[error("crypto error: {0}")]
    Crypto(#[from] lbm_crypto::CryptoError),
    /// Canonicalization failed.
    #[error("canonical encoding error: {0}")]
    Canonical(#[from] lbm_types::canonical::CanonicalError),
    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ChannelError> for lbm_types::errors::LbmError {
    fn from(e: ChannelError) -> Self {
        match &e {
            ChannelError::CounterGap { .. }
            | ChannelError::BadSignature
            | ChannelError::ClockDrift
            | ChannelError::HelloHashMismatch
            | ChannelError::FrameTooLarge(_)
            | ChannelError::Malformed(_) => lbm_types::errors::LbmError::Protocol(e.to_string()),
            ChannelError::Io(_) | ChannelError::Json(_) | ChannelError::Canonical(_) | ChannelError::Crypto(_) => {
                lbm_types::errors::LbmError::Internal(e.to_string())
            }
        }
    }
}
