//! Local read/write helpers not reachable over the P2P wire: claim search,
//! artifact storage, and peer/subscription management, all driven by the
//! stdin request loop (§6).

use lbm_types::cas::Visibility;
use lbm_types::errors::LbmError;
use lbm_types::{GraphHit, PeerInfo, Subscription, MAX_CLAIM_TEXT_BYTES};

use crate::container::Node;

impl Node {
    /// Rank up to `limit` claims in `group_id`'s context graph by similarity
    /// to `query`.
    pub async fn search_claims(&self, group_id: &str, query: &str, limit: usize, include_retracted: bool) -> Result<Vec<GraphHit>, LbmError> {
        let handle = self.group(group_id).await.ok_or_else(|| LbmError::NotFound(group_id.to_string()))?;
        let group = handle.lock().await;
        Ok(group.graph.search(query, limit, include_retracted))
    }

    /// Store a claim artifact (`{text, tags}` JSON) in the CAS, scoped to
    /// `group_id`, returning its hash for use in a subsequent `claim` call.
    pub fn put_claim_artifact(&self, group_id: &str, text: &str, tags: Vec<String>) -> Result<String, LbmError> {
        if text.is_empty() {
            return Err(LbmError::Validation("claim text must not be empty".into()));
        }
        if text.len() > MAX_CLAIM_TEXT_BYTES {
            return Err(LbmError::Validation(format!(
                "claim text exceeds {MAX_CLAIM_TEXT_BYTES} bytes"
            )));
        }
        let body = serde_json::json!({"text": text, "tags": tags});
        let bytes = serde_json::to_vec(&body).map_err(|e| LbmError::Internal(e.to_string()))?;
        self.cas.put(&bytes, Visibility::Group(group_id.to_string()), "claim", Some(group_id.to_string())).map_err(LbmError::from)
    }

    /// Store an already-encrypted package artifact in the CAS, scoped to
    /// `group_id`, returning its hash for use in a subsequent `offer_create`
    /// call.
    pub fn put_package_artifact(&self, group_id: &str, encrypted_bytes: &[u8]) -> Result<String, LbmError> {
        self.cas
            .put(encrypted_bytes, Visibility::Group(group_id.to_string()), "package", Some(group_id.to_string()))
            .map_err(LbmError::from)
    }

    /// Remember a peer at `host:port`, persisting the address book.
    pub fn remember_peer(&self, host: &str, port: u16, info: PeerInfo) -> Result<(), LbmError> {
        let key = format!("{host}:{port}");
        self.remember_peer_and_save(key, info).map_err(|e| LbmError::Io(e.to_string()))
    }

    /// Every remembered peer, keyed `host:port`.
    pub fn list_peers(&self) -> std::collections::BTreeMap<String, PeerInfo> {
        self.peers_snapshot()
    }

    /// Create or replace a standing subscription to sync `group_id` from
    /// `peer_host:peer_port` every `sync_interval_s` seconds.
    pub fn subscribe(&self, group_id: &str, peer_host: &str, peer_port: u16, sync_interval_s: u64) -> Result<(), LbmError> {
        let sub = Subscription {
            peer_host: peer_host.to_string(),
            peer_port,
            sync_interval_s,
            enabled: true,
            last_sync_ms: None,
            last_error: None,
        };
        self.set_subscription_and_save(group_id.to_string(), sub).map_err(|e| LbmError::Io(e.to_string()))
    }

    /// Disable (but keep) `group_id`'s subscription.
    pub fn unsubscribe(&self, group_id: &str) -> Result<(), LbmError> {
        self.update_subscription(group_id, |s| s.enabled = false);
        self.save_subscriptions().map_err(|e| LbmError::Io(e.to_string()))
    }

    /// Every standing subscription, keyed by group id.
    pub fn list_subscriptions(&self) -> std::collections::BTreeMap<String, Subscription> {
        self.subscriptions_snapshot()
    }
}
