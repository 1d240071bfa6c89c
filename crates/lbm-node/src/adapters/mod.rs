//! Outward-facing adapters: keystore loading, the peer/subscription
//! registries, and group synchronization over the P2P client.

pub mod keystore;
pub mod registry;
pub mod sync;

pub use sync::SyncScheduler;
