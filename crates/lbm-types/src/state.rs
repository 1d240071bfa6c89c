//! Derived group state: the result of folding a chain's transactions.

use crate::chain::Policy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A listed package offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Signing public key of the seller (the block author at `offer_create` time).
    pub seller: String,
    /// Human-readable title.
    pub title: String,
    /// Price in group credit.
    pub price: u64,
    /// Currency label, copied from policy at creation time for display.
    pub currency: String,
    /// SHA-256 hex hash of the encrypted package artifact.
    pub package_hash: String,
    /// Free-text tags.
    pub tags: Vec<String>,
    /// Whether the offer can still be purchased.
    pub active: bool,
}

/// The full derived state of one group's chain: membership, balances,
/// policy, offers, and purchase grants. Deterministically reproducible by
/// replaying every transaction from genesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    /// Current policy.
    pub policy: Policy,
    /// Current member set (signing public keys).
    pub members: BTreeSet<String>,
    /// Subset of `members` with admin privileges.
    pub admins: BTreeSet<String>,
    /// Non-negative balances, including the [`crate::chain::TREASURY`] sentinel.
    pub balances: BTreeMap<String, u64>,
    /// Sum of all balances; monotone non-decreasing.
    pub total_supply: u64,
    /// Offers by id.
    pub offers: BTreeMap<String, Offer>,
    /// Fulfilled purchases, keyed `"{offer_id}:{buyer}"`.
    pub grants: BTreeSet<String>,
}

impl GroupState {
    /// Balance of `pub_key`, or 0 if it has never held funds.
    pub fn balance_of(&self, pub_key: &str) -> u64 {
        self.balances.get(pub_key).copied().unwrap_or(0)
    }

    /// `Σ balances == total_supply`, the conservation invariant.
    pub fn balances_conserved(&self) -> bool {
        self.balances.values().sum::<u64>() == self.total_supply
    }

    /// Grant key for an offer purchase.
    pub fn grant_key(offer_id: &str, buyer: &str) -> String {
        format!("{offer_id}:{buyer}")
    }
}
