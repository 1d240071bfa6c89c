//! Cross-crate integration flows: a node composed from its real subsystems,
//! talking to another node over an actual TCP socket, or surviving a
//! simulated crash between WAL stage and commit.

mod crash_recovery;
mod genesis_faucet_and_fee;
mod handshake_replay;
mod market_purchase;
mod two_node_sync;

/// Shared helpers for spinning up a [`lbm_node::container::Node`] rooted at
/// a fresh temp directory.
pub(crate) mod harness {
    use lbm_node::container::{Node, NodeSettings};
    use tempfile::TempDir;

    /// A composed node plus the temp directory keeping its data alive.
    pub struct TestNode {
        pub node: Node,
        _dir: TempDir,
    }

    /// Compose a fresh node under a new temp directory, with the P2P server
    /// bound to an OS-assigned localhost port.
    pub async fn spawn_node() -> TestNode {
        let dir = TempDir::new().expect("tempdir");
        let settings = NodeSettings {
            data_dir: dir.path().to_path_buf(),
            p2p_bind: "127.0.0.1:0".to_string(),
            ..NodeSettings::default()
        };
        let node = lbm_node::wiring::compose(settings).await.expect("compose node");
        TestNode { node, _dir: dir }
    }
}
