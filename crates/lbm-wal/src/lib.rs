//! Write-ahead log: crash-atomic multi-file JSON writes.
//!
//! A [`Wal`] stages writes to several target paths under one transaction id,
//! then commits (all targets updated) or rolls back (all targets restored to
//! their pre-transaction bytes). Recovery on [`Wal::open`] replays any
//! transaction whose commit record made it to disk and rolls back any that
//! didn't, so a crash at any point leaves every target file equal to either
//! its pre- or post-transaction contents — never a torn mix.

#![warn(missing_docs)]

pub mod error;
pub mod fs;
mod transaction;

pub use error::WalError;
pub use transaction::{Transaction, Wal};
