//! The node aggregate: keystore, CAS, WAL, the hosted-group map, and the
//! non-canonical bookkeeping (peers, subscriptions, market cache) the P2P
//! and sync layers operate on.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use lbm_cas::CasStore;
use lbm_chain::Chain;
use lbm_crypto::signatures::Ed25519KeyPair;
use lbm_crypto::agreement::X25519KeyPair;
use lbm_graph::ContextGraph;
use lbm_p2p::ports::OfferAnnouncement;
use lbm_types::{PeerInfo, Subscription};
use lbm_wal::Wal;

use super::config::NodeSettings;

/// One hosted group: its signed chain and the derived context graph kept
/// alongside it. Neither field is ever mutated except under the group's
/// lock in [`Node::groups`].
pub struct Group {
    /// The group's append-only signed chain and derived state.
    pub chain: Chain,
    /// The context graph rebuilt from (or kept in step with) the chain.
    pub graph: ContextGraph,
}

impl Group {
    /// Wrap a chain with a freshly-built empty graph.
    pub fn new(chain: Chain) -> Self {
        Self { chain, graph: ContextGraph::new() }
    }
}

/// The long-lived node aggregate composed at startup by [`crate::wiring`]
/// and shared (via `Arc`) between the P2P server, the sync scheduler, and
/// any stdin request loop.
pub struct Node {
    /// Environment-derived settings this node was started with.
    pub settings: NodeSettings,
    /// This node's long-lived Ed25519 identity.
    pub sign_key: Ed25519KeyPair,
    /// This node's long-lived X25519 key-agreement identity.
    pub enc_key: X25519KeyPair,
    /// Content-addressed object store, shared across every group.
    pub cas: CasStore,
    /// Write-ahead log, shared across every group.
    pub wal: Wal,
    /// Hosted groups, keyed by group id. Each group is behind its own
    /// `tokio::sync::Mutex` so concurrent operations on different groups
    /// never contend; `append`/sync-replace hold the per-group lock for the
    /// whole operation (§5).
    pub groups: RwLock<BTreeMap<String, Arc<AsyncMutex<Group>>>>,
    /// Remembered peer address book (`peers.json`), keyed `"host:port"`.
    peers: SyncMutex<BTreeMap<String, PeerInfo>>,
    /// Standing sync subscriptions (`subscriptions.json`), keyed by group id.
    subscriptions: SyncMutex<BTreeMap<String, Subscription>>,
    /// Cross-group offer discovery cache, keyed `"{group_id}:{offer_id}"`.
    /// Non-canonical: populated by `market_announce_offers`, never
    /// authoritative over the chain-stored [`lbm_types::Offer`].
    market: SyncMutex<BTreeMap<String, OfferAnnouncement>>,
    /// Process start time, for `health`'s `uptime_s`.
    started_at: Instant,
}

impl Node {
    /// Assemble a node from its already-opened subsystems. Called only by
    /// [`crate::wiring`], which is responsible for loading keys, groups,
    /// peers, and subscriptions beforehand.
    pub fn new(settings: NodeSettings, sign_key: Ed25519KeyPair, enc_key: X25519KeyPair, cas: CasStore, wal: Wal) -> Self {
        Self {
            settings,
            sign_key,
            enc_key,
            cas,
            wal,
            groups: RwLock::new(BTreeMap::new()),
            peers: SyncMutex::new(BTreeMap::new()),
            subscriptions: SyncMutex::new(BTreeMap::new()),
            market: SyncMutex::new(BTreeMap::new()),
            started_at: Instant::now(),
        }
    }

    /// This node's signing public key, base64.
    pub fn sign_pub(&self) -> String {
        self.sign_key.public_key().to_base64()
    }

    /// This node's key-agreement public key, base64.
    pub fn enc_pub(&self) -> String {
        self.enc_key.public_key().to_base64()
    }

    /// A 12-character display prefix of the signing public key.
    pub fn node_id(&self) -> String {
        self.sign_pub().chars().take(12).collect()
    }

    /// Seconds since this `Node` was constructed.
    pub fn uptime_s(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Every group id currently hosted.
    pub async fn group_ids(&self) -> Vec<String> {
        self.groups.read().await.keys().cloned().collect()
    }

    /// The group handle for `group_id`, if hosted.
    pub async fn group(&self, group_id: &str) -> Option<Arc<AsyncMutex<Group>>> {
        self.groups.read().await.get(group_id).cloned()
    }

    /// Register a newly created or freshly synced group, replacing any
    /// existing entry under the same id.
    pub async fn insert_group(&self, group_id: String, group: Group) -> Arc<AsyncMutex<Group>> {
        let handle = Arc::new(AsyncMutex::new(group));
        self.groups.write().await.insert(group_id, handle.clone());
        handle
    }

    /// Every group id `sign_pub` currently belongs to.
    pub async fn member_groups(&self, sign_pub: &str) -> std::collections::BTreeSet<String> {
        let groups = self.groups.read().await;
        let mut out = std::collections::BTreeSet::new();
        for (group_id, handle) in groups.iter() {
            let group = handle.lock().await;
            if group.chain.state().members.contains(sign_pub) {
                out.insert(group_id.clone());
            }
        }
        out
    }

    /// Snapshot the current peer address book.
    pub fn peers_snapshot(&self) -> BTreeMap<String, PeerInfo> {
        self.peers.lock().clone()
    }

    /// Replace the whole peer address book (used when loading from disk).
    pub fn load_peers(&self, peers: BTreeMap<String, PeerInfo>) {
        *self.peers.lock() = peers;
    }

    /// Remember or update a peer's entry.
    pub fn remember_peer(&self, host_port: String, info: PeerInfo) {
        self.peers.lock().insert(host_port, info);
    }

    /// Drop a remembered peer.
    pub fn forget_peer(&self, host_port: &str) -> Option<PeerInfo> {
        self.peers.lock().remove(host_port)
    }

    /// Snapshot the current subscription set.
    pub fn subscriptions_snapshot(&self) -> BTreeMap<String, Subscription> {
        self.subscriptions.lock().clone()
    }

    /// Replace the whole subscription set (used when loading from disk).
    pub fn load_subscriptions(&self, subs: BTreeMap<String, Subscription>) {
        *self.subscriptions.lock() = subs;
    }

    /// Create or replace a standing subscription for `group_id`.
    pub fn set_subscription(&self, group_id: String, sub: Subscription) {
        self.subscriptions.lock().insert(group_id, sub);
    }

    /// Run `f` against the subscription for `group_id`, if any, and persist
    /// the mutation back into the in-memory table.
    pub fn update_subscription(&self, group_id: &str, f: impl FnOnce(&mut Subscription)) {
        if let Some(sub) = self.subscriptions.lock().get_mut(group_id) {
            f(sub);
        }
    }

    /// Every subscription entry due for a sync attempt at `now_ms`.
    pub fn due_subscriptions(&self, now_ms: i64) -> Vec<(String, Subscription)> {
        self.subscriptions
            .lock()
            .iter()
            .filter(|(_, s)| s.is_due(now_ms))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Record `offers` (announced by `from_sign_pub`) in the discovery cache.
    pub fn market_announce(&self, offers: Vec<OfferAnnouncement>) {
        let mut market = self.market.lock();
        for offer in offers {
            let key = format!("{}:{}", offer.group_id, offer.offer_id);
            market.insert(key, offer);
        }
    }

    /// The full discovery cache contents.
    pub fn market_list(&self) -> Vec<OfferAnnouncement> {
        self.market.lock().values().cloned().collect()
    }
}
