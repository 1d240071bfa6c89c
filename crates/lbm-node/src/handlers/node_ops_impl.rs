//! [`NodeOps`] implementation: the surface the authenticated P2P dispatcher
//! calls into after admission and authorization checks.

use std::collections::BTreeSet;

use async_trait::async_trait;

use lbm_chain::ChainSnapshot;
use lbm_p2p::ports::{HealthInfo, NodeInfo, NodeOps, OfferAnnouncement};
use lbm_types::{Block, LbmError, Transaction};

use crate::container::Node;

#[async_trait]
impl NodeOps for Node {
    async fn health(&self) -> HealthInfo {
        HealthInfo { status: "ok".to_string(), uptime_s: self.uptime_s(), group_count: self.group_ids().await.len() }
    }

    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            node_id: self.node_id(),
            sign_pub: self.sign_pub(),
            enc_pub: self.enc_pub(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn group_ids(&self) -> Vec<String> {
        Node::group_ids(self).await
    }

    async fn member_groups(&self, sign_pub: &str) -> BTreeSet<String> {
        Node::member_groups(self, sign_pub).await
    }

    async fn get_chain(&self, group_id: &str) -> Result<ChainSnapshot, LbmError> {
        let handle = self.group(group_id).await.ok_or_else(|| LbmError::NotFound(group_id.to_string()))?;
        let group = handle.lock().await;
        Ok(group.chain.snapshot())
    }

    async fn get_block(&self, group_id: &str, height: u64) -> Result<Block, LbmError> {
        let handle = self.group(group_id).await.ok_or_else(|| LbmError::NotFound(group_id.to_string()))?;
        let group = handle.lock().await;
        group
            .chain
            .blocks()
            .iter()
            .find(|b| b.height == height)
            .cloned()
            .ok_or_else(|| LbmError::NotFound(format!("{group_id}@{height}")))
    }

    async fn cas_get(&self, hash: &str) -> Result<Vec<u8>, LbmError> {
        self.cas.get(hash).map_err(LbmError::from)
    }

    fn cas_is_visible(&self, hash: &str, groups: &BTreeSet<String>) -> bool {
        self.cas.is_visible(hash, groups)
    }

    async fn market_announce_offers(&self, _from_sign_pub: &str, offers: Vec<OfferAnnouncement>) -> Result<(), LbmError> {
        self.market_announce(offers);
        Ok(())
    }

    async fn market_list_offers(&self) -> Vec<OfferAnnouncement> {
        self.market_list()
    }

    async fn purchase(&self, offer_id: &str, buyer_pub: &str, payment_proof: serde_json::Value) -> Result<(), LbmError> {
        let signed_block_value = payment_proof
            .get("signed_block")
            .ok_or_else(|| LbmError::Validation("payment_proof missing signed_block".to_string()))?;
        let block: Block = serde_json::from_value(signed_block_value.clone())
            .map_err(|e| LbmError::Validation(format!("bad signed_block: {e}")))?;

        if block.author != buyer_pub {
            return Err(LbmError::Authorization("signed_block author does not match buyer_pub".to_string()));
        }
        let matches_offer = block.txs.iter().any(|tx| {
            matches!(tx, Transaction::OfferPurchase { offer_id: o, buyer } if o == offer_id && buyer == buyer_pub)
        });
        if !matches_offer {
            return Err(LbmError::Validation("signed_block does not purchase the requested offer".to_string()));
        }

        let group_id = block.group_id.clone();
        let handle = self.group(&group_id).await.ok_or_else(|| LbmError::NotFound(group_id.clone()))?;
        let mut group = handle.lock().await;
        group.chain.append(block)?;

        let group_dir = self.settings.group_dir(&group_id);
        let tx = self.wal.begin();
        tx.write_json(&group_dir.join("chain.json"), &group.chain.snapshot())
            .map_err(|e| LbmError::Io(e.to_string()))?;
        tx.commit().map_err(|e| LbmError::Io(e.to_string()))?;
        Ok(())
    }
}
