//! End-to-end group sync between two composed nodes talking over a real
//! TCP socket: node A hosts a group and records a claim, node B joins as a
//! member, syncs A's chain, and finds the claim in its own context graph.

use std::sync::Arc;
use std::time::Duration;

use lbm_p2p::P2pServer;
use lbm_types::MemberRole;

use crate::integration::harness::spawn_node;

async fn start_server(node: Arc<lbm_node::container::Node>) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    drop(std_listener);
    let bind_addr = addr.to_string();

    let server = Arc::new(P2pServer::new(node.clone(), node.sign_key.clone(), node.enc_key.clone()));
    let serve_addr = bind_addr.clone();
    tokio::spawn(async move {
        let _ = server.serve(&serve_addr).await;
    });
    // Give the accept loop a moment to bind before the first connection attempt.
    tokio::time::sleep(Duration::from_millis(50)).await;
    bind_addr
}

#[tokio::test]
async fn claim_propagates_to_a_syncing_peer() {
    let node_a = Arc::new(spawn_node().await.node);
    let node_b = Arc::new(spawn_node().await.node);

    let group_id = node_a.create_group("study-circle", "CREDIT").await.unwrap();
    node_a.member_add(&group_id, &node_b.sign_pub(), MemberRole::Member).await.unwrap();

    let artifact_hash = node_a.put_claim_artifact(&group_id, "rust ownership and lifetimes", vec!["rust".into()]).unwrap();
    node_a.claim(&group_id, &artifact_hash).await.unwrap();

    let (a_host, a_port) = {
        let addr = start_server(node_a.clone()).await;
        let (host, port) = addr.rsplit_once(':').unwrap();
        (host.to_string(), port.parse::<u16>().unwrap())
    };

    node_b.sync_group(&group_id, &a_host, a_port).await.unwrap();

    let groups = node_b.group_ids().await;
    assert_eq!(groups, vec![group_id.clone()]);

    let hits = node_b.search_claims(&group_id, "rust lifetimes", 10, false).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].claim_hash, artifact_hash);
}

#[tokio::test]
async fn second_sync_is_a_no_op_when_already_caught_up() {
    let node_a = Arc::new(spawn_node().await.node);
    let node_b = Arc::new(spawn_node().await.node);

    let group_id = node_a.create_group("idle-group", "CREDIT").await.unwrap();
    let addr = start_server(node_a.clone()).await;
    let (host, port) = addr.rsplit_once(':').unwrap();
    let port: u16 = port.parse().unwrap();

    node_b.sync_group(&group_id, host, port).await.unwrap();
    node_b.sync_group(&group_id, host, port).await.unwrap();

    let handle = node_b.group(&group_id).await.unwrap();
    assert_eq!(handle.lock().await.chain.height(), Some(0));
}
