//! The outbound port the dispatch layer calls into. A concrete `Node` (in
//! `lbm-node`) implements [`NodeOps`]; this crate never depends on that
//! crate, matching the teacher's `ports::outbound` seam in its API gateway.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lbm_chain::ChainSnapshot;
use lbm_types::{Block, LbmError, Offer};

/// Reply to `health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    /// Always `"ok"` if the handler ran at all.
    pub status: String,
    /// Seconds since the node process started.
    pub uptime_s: u64,
    /// Number of groups this node currently hosts.
    pub group_count: usize,
}

/// Reply to `node_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// 12-character display prefix of the signing public key.
    pub node_id: String,
    /// Signing public key (base64).
    pub sign_pub: String,
    /// Key-agreement public key (base64).
    pub enc_pub: String,
    /// Crate version string.
    pub version: String,
}

/// A market offer advertised to (or queried from) the cross-group discovery
/// cache via `market_announce_offers`/`market_list_offers`. Distinct from
/// the chain-canonical [`Offer`]: this is a non-authoritative gossip record,
/// keyed by the announcing group, used to discover offers before deciding to
/// sync that group's full chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferAnnouncement {
    /// Group the offer belongs to.
    pub group_id: String,
    /// Offer id within that group.
    pub offer_id: String,
    /// The offer's current chain-canonical fields, as last observed.
    pub offer: Offer,
}

/// The operations the P2P dispatch layer calls into after admission and
/// authorization checks. Every method that touches a group's private state
/// is still expected to re-validate membership internally (defense in
/// depth) — the dispatcher's checks only decide whether to route the call
/// at all.
#[async_trait]
pub trait NodeOps: Send + Sync {
    /// Aggregate health snapshot.
    async fn health(&self) -> HealthInfo;

    /// Static identity/version information.
    fn node_info(&self) -> NodeInfo;

    /// Every group id this node currently hosts.
    async fn group_ids(&self) -> Vec<String>;

    /// Every group id `sign_pub` currently belongs to, used by the
    /// dispatcher's authorization checks and by CAS visibility.
    async fn member_groups(&self, sign_pub: &str) -> BTreeSet<String>;

    /// Full chain snapshot for `group_id`.
    async fn get_chain(&self, group_id: &str) -> Result<ChainSnapshot, LbmError>;

    /// One block of `group_id` at `height`.
    async fn get_block(&self, group_id: &str, height: u64) -> Result<Block, LbmError>;

    /// Raw bytes of a CAS object, without an authorization check (the
    /// dispatcher checks visibility via [`NodeOps::cas_is_visible`] first).
    async fn cas_get(&self, hash: &str) -> Result<Vec<u8>, LbmError>;

    /// Whether `hash` is visible to a caller belonging to `groups`.
    fn cas_is_visible(&self, hash: &str, groups: &BTreeSet<String>) -> bool;

    /// Record `offers` (announced by `from_sign_pub`) in the non-canonical
    /// market discovery cache.
    async fn market_announce_offers(
        &self,
        from_sign_pub: &str,
        offers: Vec<OfferAnnouncement>,
    ) -> Result<(), LbmError>;

    /// The full contents of the market discovery cache.
    async fn market_list_offers(&self) -> Vec<OfferAnnouncement>;

    /// Append a buyer-signed block (carried as `signed_block` inside
    /// `payment_proof`) containing a single `offer_purchase` transaction for
    /// `offer_id`/`buyer_pub` to that group's chain.
    async fn purchase(
        &self,
        offer_id: &str,
        buyer_pub: &str,
        payment_proof: serde_json::Value,
    ) -> Result<(), LbmError>;
}
