//! Per-group signed chain and deterministic state machine.
//!
//! [`Chain`] owns the append-only block list and the [`lbm_types::GroupState`]
//! derived from replaying it. [`validate::apply_transaction`] holds the
//! per-transaction-kind semantics (§4.1); [`Chain::append`] runs the
//! seven-step block validation order before committing.

#![warn(missing_docs)]

mod chain;
mod error;
pub mod validate;

pub use chain::{Chain, ChainSnapshot, ZERO_HASH};
pub use error::ChainError;
