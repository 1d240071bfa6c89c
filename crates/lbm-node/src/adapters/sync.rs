//! Group synchronization (§4.7): pull a peer's chain for one group, accept
//! it by extension or wholesale replacement, fetch any CAS artifacts the
//! new blocks reference, and persist chain+graph+artifacts atomically.

use std::collections::BTreeSet;

use lbm_chain::{Chain, ChainSnapshot};
use lbm_graph::ContextGraph;
use lbm_p2p::client::P2pClient;
use lbm_p2p::error::P2pError;
use lbm_types::cas::Visibility;
use lbm_types::errors::LbmError;
use lbm_types::{Subscription, Transaction};

use crate::container::{Group, Node};

fn map_p2p_err(e: P2pError) -> LbmError {
    match e {
        P2pError::Io(io) => LbmError::Io(io.to_string()),
        P2pError::Channel(ch) => LbmError::Protocol(ch.to_string()),
        P2pError::RateLimited(r) => r.into(),
        P2pError::HandshakeTimeout => LbmError::Protocol("handshake timed out".into()),
    }
}

fn map_wal_err(e: lbm_wal::WalError) -> LbmError {
    LbmError::Io(e.to_string())
}

/// Rebuild a context graph from scratch by replaying every `Claim`/`Retract`
/// transaction in `chain`, fetching each claim artifact's `{text, tags}`
/// JSON from the CAS.
pub(crate) fn rebuild_graph(chain: &Chain, cas: &lbm_cas::CasStore) -> ContextGraph {
    let mut graph = ContextGraph::new();
    for block in chain.blocks() {
        for tx in &block.txs {
            match tx {
                Transaction::Claim { artifact_hash } => {
                    if let Ok(bytes) = cas.get(artifact_hash) {
                        if let Ok(artifact) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                            let text = artifact.get("text").and_then(|v| v.as_str()).unwrap_or("");
                            let tags: Vec<String> = artifact
                                .get("tags")
                                .and_then(|v| v.as_array())
                                .map(|a| a.iter().filter_map(|t| t.as_str().map(String::from)).collect())
                                .unwrap_or_default();
                            graph.index_claim(artifact_hash, text, tags, block.ts_ms);
                        }
                    }
                }
                Transaction::Retract { artifact_hash } => graph.retract(artifact_hash),
                _ => {}
            }
        }
    }
    graph
}

impl Node {
    /// Fetch every CAS artifact referenced by `Claim` transactions in
    /// `blocks` that this node does not already hold, authorized by this
    /// node's own membership in `group_id`.
    async fn fetch_missing_artifacts(&self, client: &mut P2pClient, blocks: &[lbm_types::Block]) -> Result<(), LbmError> {
        let mut hashes = BTreeSet::new();
        for block in blocks {
            for tx in &block.txs {
                if let Transaction::Claim { artifact_hash } = tx {
                    hashes.insert(artifact_hash.clone());
                }
            }
        }
        for hash in hashes {
            if self.cas.has(&hash) {
                continue;
            }
            let response = client.call("cas_get", serde_json::json!({"hash": hash})).await.map_err(map_p2p_err)?;
            if let Some(err) = response.error {
                return Err(LbmError::Io(format!("cas_get {hash} failed: {}", err.message)));
            }
            let result = response.result.ok_or_else(|| LbmError::Io(format!("cas_get {hash} returned no result")))?;
            let data_b64 = result
                .get("data_b64")
                .and_then(|v| v.as_str())
                .ok_or_else(|| LbmError::Io(format!("cas_get {hash} missing data_b64")))?;
            use base64::Engine;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data_b64)
                .map_err(|e| LbmError::Io(format!("bad base64 from peer: {e}")))?;
            let stored_hash =
                self.cas
                    .put(&bytes, Visibility::Group(blocks[0].group_id.clone()), "claim", Some(blocks[0].group_id.clone()))?;
            if stored_hash != hash {
                return Err(LbmError::Integrity(format!("peer sent artifact not matching hash {hash}")));
            }
        }
        Ok(())
    }

    /// Run the group synchronization algorithm (§4.7) for `group_id` against
    /// the peer at `peer_host:peer_port`. No partial acceptance: either the
    /// whole sync succeeds and is persisted atomically, or nothing changes.
    pub async fn sync_group(&self, group_id: &str, peer_host: &str, peer_port: u16) -> Result<(), LbmError> {
        let addr = format!("{peer_host}:{peer_port}");
        let mut client = P2pClient::connect(&addr, &self.sign_key, &self.enc_key).await.map_err(map_p2p_err)?;

        let response = client.call("get_chain", serde_json::json!({"group_id": group_id})).await.map_err(map_p2p_err)?;
        if let Some(err) = response.error {
            return Err(LbmError::Io(format!("get_chain failed: {}", err.message)));
        }
        let result = response.result.ok_or_else(|| LbmError::Io("get_chain returned no result".to_string()))?;
        let remote_snapshot: ChainSnapshot = serde_json::from_value(result).map_err(|e| LbmError::Protocol(e.to_string()))?;
        let remote_blocks = remote_snapshot.blocks;
        let remote_height = remote_blocks.last().map(|b| b.height);

        let existing = self.group(group_id).await;

        let (new_chain, fetch_blocks): (Chain, Vec<lbm_types::Block>) = match existing {
            None => {
                if remote_blocks.is_empty() {
                    return Err(LbmError::NotFound(format!("peer has no chain for group {group_id}")));
                }
                let chain = Chain::from_snapshot(ChainSnapshot {
                    blocks: remote_blocks.clone(),
                    head: remote_blocks.last().cloned(),
                    state: Default::default(),
                })?;
                (chain, remote_blocks)
            }
            Some(handle) => {
                let local_chain = handle.lock().await.chain.clone();
                let local_height = local_chain.height();
                if remote_height.is_none() || remote_height <= local_height {
                    return Ok(());
                }
                let mut candidate = local_chain.clone();
                match candidate.try_extend_with_suffix(&remote_blocks) {
                    Ok(_) => (candidate, remote_blocks),
                    Err(_) => {
                        let replaced = local_chain.try_replace_with(&remote_blocks)?;
                        (replaced, remote_blocks)
                    }
                }
            }
        };

        self.fetch_missing_artifacts(&mut client, &fetch_blocks).await?;
        let graph = rebuild_graph(&new_chain, &self.cas);

        let group_dir = self.settings.group_dir(group_id);
        let tx = self.wal.begin();
        tx.write_json(&group_dir.join("chain.json"), &new_chain.snapshot()).map_err(map_wal_err)?;
        tx.write_json(&group_dir.join("graph.json"), &graph).map_err(map_wal_err)?;
        tx.commit().map_err(map_wal_err)?;

        self.insert_group(group_id.to_string(), Group { chain: new_chain, graph }).await;
        Ok(())
    }
}

/// Periodically runs every due subscription's sync, applying exponential
/// backoff on failure without mutating the configured `sync_interval_s`.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Run one pass: sync every subscription due at `now_ms`, recording
    /// success/failure back into the subscription table.
    pub async fn run_once(node: &Node, now_ms: i64) {
        for (group_id, sub) in node.due_subscriptions(now_ms) {
            match node.sync_group(&group_id, &sub.peer_host, sub.peer_port).await {
                Ok(()) => node.update_subscription(&group_id, |s| {
                    s.last_sync_ms = Some(now_ms);
                    s.last_error = None;
                }),
                Err(e) => {
                    tracing::warn!(group_id = %group_id, error = %e, "sync_group failed");
                    node.update_subscription(&group_id, |s| {
                        s.last_error = Some(e.to_string());
                        s.last_sync_ms = Some(now_ms);
                    });
                }
            }
            let _ = node.save_subscriptions();
        }
    }

    /// Next backoff delay for `sub` after a failed attempt, doubling from
    /// `sync_interval_s` and capping at 10x, without mutating the
    /// configured interval itself.
    pub fn backoff_delay_s(sub: &Subscription, consecutive_failures: u32) -> u64 {
        let base = sub.sync_interval_s.max(1);
        let factor = 1u64 << consecutive_failures.min(4);
        (base * factor).min(base * 10)
    }
}
