//! Shared error taxonomy.
//!
//! Every lower-level crate defines its own `thiserror` enum for the failures
//! specific to it; [`LbmError`] is the boundary type that aggregates them
//! into the six stable wire codes the P2P layer and node operations return.

use thiserror::Error;

/// Stable, wire-safe error codes. Never leak internal detail across the
/// network — only this closed set of kinds and a human message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Requested resource does not exist.
    NotFound,
    /// Malformed input: field types, size caps, character sets.
    BadRequest,
    /// Caller lacks the required membership/admin/visibility right.
    Forbidden,
    /// Caller exceeded a connection or request rate limit.
    RateLimited,
    /// A chain-level or storage-level invariant would be violated.
    NodeError,
    /// Unexpected internal failure; never includes a stack trace on the wire.
    Internal,
}

impl ErrorCode {
    /// The lowercase wire name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::NodeError => "node_error",
            ErrorCode::Internal => "internal",
        }
    }
}

/// The top-level error type returned by Node operations and mapped to wire
/// codes at the P2P dispatch boundary.
#[derive(Debug, Error)]
pub enum LbmError {
    /// Validation failure: malformed input, size cap, unknown field.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Authorization failure: not a member, not an admin, object not visible.
    #[error("forbidden: {0}")]
    Authorization(String),

    /// State-machine failure: a block or transaction would violate an
    /// invariant (signature, height, timestamp, balance, ...).
    #[error("state machine rejected: {0}")]
    StateMachine(String),

    /// Protocol failure: handshake mismatch, counter gap, oversize frame,
    /// clock drift. Always terminates the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O failure: disk read/write, CAS miss.
    #[error("io error: {0}")]
    Io(String),

    /// Rate limit exceeded; `wait_seconds` is advisory.
    #[error("rate limited, retry after {wait_seconds:.1}s")]
    RateLimited {
        /// Seconds until the caller is likely to be admitted.
        wait_seconds: f64,
    },

    /// CAS object content no longer matches its hash name.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LbmError {
    /// Map to the stable wire code.
    pub fn code(&self) -> ErrorCode {
        match self {
            LbmError::Validation(_) => ErrorCode::BadRequest,
            LbmError::Authorization(_) => ErrorCode::Forbidden,
            LbmError::StateMachine(_) => ErrorCode::NodeError,
            LbmError::Protocol(_) => ErrorCode::Internal,
            LbmError::NotFound(_) => ErrorCode::NotFound,
            LbmError::Io(_) => ErrorCode::NodeError,
            LbmError::RateLimited { .. } => ErrorCode::RateLimited,
            LbmError::Integrity(_) => ErrorCode::NotFound,
            LbmError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<crate::canonical::CanonicalError> for LbmError {
    fn from(e: crate::canonical::CanonicalError) -> Self {
        LbmError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for LbmError {
    fn from(e: std::io::Error) -> Self {
        LbmError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_as_expected() {
        assert_eq!(LbmError::Validation("x".into()).code(), ErrorCode::BadRequest);
        assert_eq!(LbmError::Authorization("x".into()).code(), ErrorCode::Forbidden);
        assert_eq!(LbmError::StateMachine("x".into()).code(), ErrorCode::NodeError);
        assert_eq!(LbmError::NotFound("x".into()).code(), ErrorCode::NotFound);
        assert_eq!(
            LbmError::RateLimited { wait_seconds: 1.0 }.code(),
            ErrorCode::RateLimited
        );
        assert_eq!(LbmError::Internal("x".into()).code(), ErrorCode::Internal);
    }

    #[test]
    fn code_strings_are_stable() {
        assert_eq!(ErrorCode::NotFound.as_str(), "not_found");
        assert_eq!(ErrorCode::BadRequest.as_str(), "bad_request");
        assert_eq!(ErrorCode::Forbidden.as_str(), "forbidden");
        assert_eq!(ErrorCode::RateLimited.as_str(), "rate_limited");
        assert_eq!(ErrorCode::NodeError.as_str(), "node_error");
        assert_eq!(ErrorCode::Internal.as_str(), "internal");
    }
}
