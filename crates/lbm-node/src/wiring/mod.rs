//! The composition root: load or generate every subsystem and assemble the
//! [`Node`] aggregate. Called once by `main` (and by integration tests that
//! need a fully-wired node against a temp directory).

use std::collections::BTreeMap;

use lbm_cas::CasStore;
use lbm_chain::{Chain, ChainSnapshot};
use lbm_wal::Wal;

use crate::adapters::keystore::load_or_generate_keys;
use crate::adapters::registry::{load_peers, load_subscriptions};
use crate::adapters::sync::rebuild_graph;
use crate::container::{Group, Node, NodeSettings};

/// Build a fully-wired [`Node`] from `settings`: keys, CAS, WAL, every
/// hosted group under `groups_dir()`, and the peer/subscription tables.
pub async fn compose(settings: NodeSettings) -> anyhow::Result<Node> {
    lbm_wal::fs::ensure_dir(&settings.groups_dir())?;

    let (sign_key, enc_key) = load_or_generate_keys(&settings)?;
    let cas = CasStore::open_with_cap(settings.cas_dir(), settings.cas_max_object_size)?;
    let wal = Wal::open(settings.wal_dir())?;

    let groups_dir = settings.groups_dir();
    let mut loaded = BTreeMap::new();
    if groups_dir.exists() {
        for entry in std::fs::read_dir(&groups_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let group_id = entry.file_name().to_string_lossy().into_owned();
            let chain_path = entry.path().join("chain.json");
            if !chain_path.exists() {
                tracing::warn!(group_id = %group_id, "group directory has no chain.json, skipping");
                continue;
            }
            let snapshot: ChainSnapshot = lbm_wal::fs::read_json(&chain_path)?;
            let chain = Chain::from_snapshot(snapshot)?;

            let graph_path = entry.path().join("graph.json");
            let graph = if graph_path.exists() {
                lbm_wal::fs::read_json(&graph_path).unwrap_or_else(|_| rebuild_graph(&chain, &cas))
            } else {
                rebuild_graph(&chain, &cas)
            };

            loaded.insert(group_id, Group { chain, graph });
        }
    }

    let node = Node::new(settings.clone(), sign_key, enc_key, cas, wal);
    for (group_id, group) in loaded {
        node.insert_group(group_id, group).await;
    }
    node.load_peers(load_peers(&settings)?);
    node.load_subscriptions(load_subscriptions(&settings)?);

    Ok(node)
}
