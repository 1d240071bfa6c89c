//! Local, admin-facing group mutations: every operation builds a block
//! authored and signed by this node's own identity, appends it to the
//! target group's chain, and persists the result in one WAL transaction.
//! None of these are reachable over the P2P wire (`purchase` is the only
//! mutation [`lbm_p2p::ports::NodeOps`] exposes) — they are driven by the
//! stdin request loop (§6).

use lbm_types::errors::LbmError;
use lbm_types::{Block, MemberRole, PolicyUpdate, Transaction};

use crate::container::Node;

fn now_ms() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

impl Node {
    /// Build, sign, append, and persist a block carrying the single
    /// transaction `tx`, authored by this node's own signing key.
    async fn append_own_tx(&self, group_id: &str, tx: Transaction) -> Result<(), LbmError> {
        let handle = self.group(group_id).await.ok_or_else(|| LbmError::NotFound(group_id.to_string()))?;
        let mut group = handle.lock().await;

        let head = group.chain.head().ok_or_else(|| LbmError::StateMachine("chain has no head".to_string()))?;
        let mut block = Block {
            group_id: group_id.to_string(),
            height: head.height + 1,
            prev: head.block_id().map_err(|e| LbmError::Internal(e.to_string()))?,
            ts_ms: now_ms(),
            author: self.sign_pub(),
            txs: vec![tx],
            sig: None,
        };
        let sig_bytes = block.signing_bytes().map_err(|e| LbmError::Internal(e.to_string()))?;
        block.sig = Some(self.sign_key.sign(&sig_bytes).to_base64());

        group.chain.append(block)?;

        let group_dir = self.settings.group_dir(group_id);
        let wal_tx = self.wal.begin();
        wal_tx
            .write_json(&group_dir.join("chain.json"), &group.chain.snapshot())
            .map_err(|e| LbmError::Io(e.to_string()))?;
        wal_tx.commit().map_err(|e| LbmError::Io(e.to_string()))?;
        Ok(())
    }

    /// Admin-only: add or re-add a member.
    pub async fn member_add(&self, group_id: &str, pub_key: &str, role: MemberRole) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::MemberAdd { pub_key: pub_key.to_string(), role }).await
    }

    /// Admin-only: remove a member.
    pub async fn member_remove(&self, group_id: &str, pub_key: &str) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::MemberRemove { pub_key: pub_key.to_string() }).await
    }

    /// Admin-only: mint `amount` to `to`.
    pub async fn mint(&self, group_id: &str, to: &str, amount: u64) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::Mint { to: to.to_string(), amount }).await
    }

    /// Transfer `amount` from this node to `to`.
    pub async fn transfer(&self, group_id: &str, to: &str, amount: u64) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::Transfer { from: self.sign_pub(), to: to.to_string(), amount }).await
    }

    /// Admin-only: apply a sparse policy update.
    pub async fn policy_update(&self, group_id: &str, updates: PolicyUpdate) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::PolicyUpdate { updates }).await
    }

    /// Member-only: record a claim over `artifact_hash`, then index it in
    /// the group's context graph.
    pub async fn claim(&self, group_id: &str, artifact_hash: &str) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::Claim { artifact_hash: artifact_hash.to_string() }).await?;
        self.reindex_claim(group_id, artifact_hash).await
    }

    /// Member-only: retract a previously-claimed artifact.
    pub async fn retract(&self, group_id: &str, artifact_hash: &str) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::Retract { artifact_hash: artifact_hash.to_string() }).await?;
        if let Some(handle) = self.group(group_id).await {
            handle.lock().await.graph.retract(artifact_hash);
            self.persist_graph(group_id).await?;
        }
        Ok(())
    }

    /// Member-only: list a package for sale.
    #[allow(clippy::too_many_arguments)]
    pub async fn offer_create(
        &self,
        group_id: &str,
        offer_id: &str,
        title: &str,
        price: u64,
        tags: Vec<String>,
        package_hash: &str,
    ) -> Result<(), LbmError> {
        self.append_own_tx(
            group_id,
            Transaction::OfferCreate {
                offer_id: offer_id.to_string(),
                title: title.to_string(),
                price,
                tags,
                package_hash: package_hash.to_string(),
            },
        )
        .await
    }

    /// Seller or admin: close an offer.
    pub async fn offer_close(&self, group_id: &str, offer_id: &str) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::OfferClose { offer_id: offer_id.to_string() }).await
    }

    /// Buy an offer hosted by this node's own chain, as this node.
    pub async fn offer_purchase(&self, group_id: &str, offer_id: &str) -> Result<(), LbmError> {
        self.append_own_tx(group_id, Transaction::OfferPurchase { offer_id: offer_id.to_string(), buyer: self.sign_pub() })
            .await
    }

    /// Fetch `artifact_hash`'s `{text, tags}` JSON from the CAS and index it
    /// into `group_id`'s context graph, persisting the graph afterward.
    async fn reindex_claim(&self, group_id: &str, artifact_hash: &str) -> Result<(), LbmError> {
        let bytes = self.cas.get(artifact_hash)?;
        let artifact: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| LbmError::Validation(format!("bad claim artifact: {e}")))?;
        let text = artifact.get("text").and_then(|v| v.as_str()).unwrap_or("");
        let tags: Vec<String> = artifact
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|t| t.as_str().map(String::from)).collect())
            .unwrap_or_default();

        if let Some(handle) = self.group(group_id).await {
            handle.lock().await.graph.index_claim(artifact_hash, text, tags, now_ms());
            self.persist_graph(group_id).await?;
        }
        Ok(())
    }

    /// Write `group_id`'s current in-memory graph to `graph.json` via the WAL.
    async fn persist_graph(&self, group_id: &str) -> Result<(), LbmError> {
        let handle = self.group(group_id).await.ok_or_else(|| LbmError::NotFound(group_id.to_string()))?;
        let group = handle.lock().await;
        let group_dir = self.settings.group_dir(group_id);
        let wal_tx = self.wal.begin();
        wal_tx.write_json(&group_dir.join("graph.json"), &group.graph).map_err(|e| LbmError::Io(e.to_string()))?;
        wal_tx.commit().map_err(|e| LbmError::Io(e.to_string()))?;
        Ok(())
    }
}
