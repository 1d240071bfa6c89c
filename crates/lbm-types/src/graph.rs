//! Context graph entry types.

use serde::{Deserialize, Serialize};

/// One indexed claim: its tags, creation time, and retraction state. Not
/// canonical — wholly derivable from a group's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Tags attached at claim time (from the claim artifact) plus any
    /// tags copied from the triggering transaction.
    pub tags: Vec<String>,
    /// Creation time in Unix milliseconds (the claiming block's `ts_ms`).
    pub created_ms: i64,
    /// Set by a later `retract` transaction for the same artifact hash.
    pub retracted: bool,
}

/// A scored search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphHit {
    /// The claim artifact's SHA-256 hex hash.
    pub claim_hash: String,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f64,
    /// Creation time, exposed for tie-break transparency.
    pub created_ms: i64,
}
