//! Rate-limit error type.

use thiserror::Error;

/// Why admission was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RateLimitError {
    /// The per-peer sliding-window request limit was hit.
    #[error("rate limited, retry after {wait_seconds:.1}s")]
    RequestsExceeded {
        /// Seconds until the oldest tracked request ages out of the window.
        wait_seconds: f64,
    },
    /// The per-IP concurrent connection limit was hit.
    #[error("too many concurrent connections from this address")]
    TooManyConnections,
}

impl From<RateLimitError> for lbm_types::errors::LbmError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::RequestsExceeded { wait_seconds } => {
                lbm_types::errors::LbmError::RateLimited { wait_seconds }
            }
            RateLimitError::TooManyConnections => lbm_types::errors::LbmError::RateLimited { wait_seconds: 0.0 },
        }
    }
}
