//! The P2P request layer (§4.6): admission control, authorization, and
//! method dispatch over a [`lbm_channel::SecureSession`].
//!
//! This crate depends only on the [`ports::NodeOps`] trait, never on a
//! concrete node implementation — `lbm-node` depends on this crate and
//! implements the trait, so the dependency graph has no cycle.

#![warn(missing_docs)]

pub mod client;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod ports;
pub mod server;

pub use client::P2pClient;
pub use dispatch::{dispatch, CallerContext};
pub use envelope::{Request, Response, ResponseError};
pub use error::P2pError;
pub use ports::{HealthInfo, NodeInfo, NodeOps, OfferAnnouncement};
pub use server::P2pServer;
