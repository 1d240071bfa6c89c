//! Node runtime: composes the keystore, CAS, WAL, chain/graph map, and P2P
//! server into the single long-lived [`container::Node`] aggregate. The
//! binary entry point is `main.rs`; this library exposes the same modules
//! for integration tests to wire a node against a temp directory directly.

pub mod adapters;
pub mod container;
pub mod genesis;
pub mod handlers;
pub mod wiring;
