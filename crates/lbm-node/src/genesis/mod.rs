//! Group creation: build and sign a genesis block, then persist the new
//! group's chain and (empty) graph through one WAL transaction.

use lbm_chain::Chain;
use lbm_types::errors::LbmError;

use crate::container::{Group, Node};

fn map_wal_err(e: lbm_wal::error::WalError) -> LbmError {
    LbmError::Io(e.to_string())
}

impl Node {
    /// Create a new group named `name` with `currency`, founded by this
    /// node's own signing key, and register it in the hosted-group map.
    /// Returns the new group id.
    pub async fn create_group(&self, name: &str, currency: &str) -> Result<String, LbmError> {
        let genesis = Chain::make_genesis(name, currency, &self.sign_key)?;
        let group_id = genesis.group_id.clone();

        let mut chain = Chain::new_empty();
        chain.append(genesis)?;

        let group_dir = self.settings.group_dir(&group_id);
        let chain_path = group_dir.join("chain.json");
        let graph_path = group_dir.join("graph.json");

        let tx = self.wal.begin();
        tx.write_json(&chain_path, &chain.snapshot()).map_err(map_wal_err)?;
        tx.write_json(&graph_path, &serde_json::json!({})).map_err(map_wal_err)?;
        tx.commit().map_err(map_wal_err)?;

        self.insert_group(group_id.clone(), Group::new(chain)).await;
        Ok(group_id)
    }
}
