//! Everything that mutates or reads a hosted group: the [`lbm_p2p::ports::NodeOps`]
//! implementation for the P2P wire, the admin-only chain mutations, read
//! helpers, and the stdin request loop's method table.

pub mod chain_ops;
pub mod local;
pub mod node_ops_impl;
pub mod queries;

pub use local::dispatch_local;
