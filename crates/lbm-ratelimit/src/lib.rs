//! Admission control for the P2P layer: a per-IP concurrent connection cap
//! and a per-peer sliding-window request cap, both bounded to a maximum
//! tracked-key count to resist DoS by key exhaustion.

#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod request;

pub use connection::{ConnectionGuard, ConnectionLimiter};
pub use error::RateLimitError;
pub use request::RequestLimiter;
