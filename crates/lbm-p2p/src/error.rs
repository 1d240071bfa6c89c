//! Connection-level failures: everything short of a dispatched request,
//! which always returns a [`crate::Response`] instead of an `Err`.

use thiserror::Error;

/// Failures that end a connection before (or instead of) producing a
/// response envelope.
#[derive(Debug, Error)]
pub enum P2pError {
    /// Listener or stream I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The secure channel rejected the handshake or a framed record.
    #[error("channel error: {0}")]
    Channel(#[from] lbm_channel::ChannelError),
    /// The per-IP connection cap was reached.
    #[error("connection rejected: {0}")]
    RateLimited(#[from] lbm_ratelimit::RateLimitError),
    /// The handshake did not complete within its deadline.
    #[error("handshake timed out")]
    HandshakeTimeout,
}
