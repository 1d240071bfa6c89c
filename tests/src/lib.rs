//! # LBM Test Suite
//!
//! Cross-crate integration tests for the Learning Battery Market core.
//! Unit tests for a single subsystem live next to that subsystem
//! (`#[cfg(test)]` modules in `lbm-chain`, `lbm-cas`, `lbm-wal`, etc.); this
//! crate only covers flows that cross crate boundaries — a node composed
//! from keystore + CAS + WAL + chain talking to another node over the wire.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/   # multi-crate flows (§8 end-to-end scenarios)
//! ```
//!
//! ## Running
//!
//! ```bash
//! cargo test -p lbm-tests
//! cargo bench -p lbm-tests
//! ```

pub mod integration;
