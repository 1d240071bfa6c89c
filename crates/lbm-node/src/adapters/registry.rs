//! Load and persist the peer address book and group subscriptions.
//!
//! Neither file participates in chain consensus or WAL transactions: both
//! are simple atomic-write JSON side tables, rebuilt best-effort and safe to
//! lose (§6 on-disk layout).

use std::collections::BTreeMap;

use lbm_types::{PeerInfo, Subscription};
use lbm_wal::fs::atomic_write_json;

use crate::container::{Node, NodeSettings};

/// Load `peers.json` from disk, defaulting to an empty book if absent.
pub fn load_peers(settings: &NodeSettings) -> std::io::Result<BTreeMap<String, PeerInfo>> {
    let path = settings.peers_path();
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    lbm_wal::fs::read_json(&path)
}

/// Load `subscriptions.json` from disk, defaulting to an empty set if absent.
pub fn load_subscriptions(settings: &NodeSettings) -> std::io::Result<BTreeMap<String, Subscription>> {
    let path = settings.subscriptions_path();
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    lbm_wal::fs::read_json(&path)
}

impl Node {
    /// Persist the current peer address book to `peers.json`.
    pub fn save_peers(&self) -> std::io::Result<()> {
        atomic_write_json(&self.settings.peers_path(), &self.peers_snapshot())
    }

    /// Persist the current subscription set to `subscriptions.json`.
    pub fn save_subscriptions(&self) -> std::io::Result<()> {
        atomic_write_json(&self.settings.subscriptions_path(), &self.subscriptions_snapshot())
    }

    /// Remember or update a peer, then persist the address book.
    pub fn remember_peer_and_save(&self, host_port: String, info: PeerInfo) -> std::io::Result<()> {
        self.remember_peer(host_port, info);
        self.save_peers()
    }

    /// Forget a peer, then persist the address book.
    pub fn forget_peer_and_save(&self, host_port: &str) -> std::io::Result<()> {
        self.forget_peer(host_port);
        self.save_peers()
    }

    /// Create or replace a subscription, then persist the subscription set.
    pub fn set_subscription_and_save(&self, group_id: String, sub: Subscription) -> std::io::Result<()> {
        self.set_subscription(group_id, sub);
        self.save_subscriptions()
    }
}
