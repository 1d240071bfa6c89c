//! Drives a full group lifecycle through the `Node` aggregate's public API
//! (as the stdin request loop would): genesis, membership with faucet
//! credit, minting, a fee-bearing transfer, and a policy update.

use lbm_types::{MemberRole, PolicyUpdate};

use crate::integration::harness::spawn_node;

#[tokio::test]
async fn faucet_mint_and_fee_bearing_transfer() {
    let test_node = spawn_node().await;
    let node = test_node.node;

    let group_id = node.create_group("campus-exchange", "CREDIT").await.unwrap();

    node.policy_update(
        &group_id,
        PolicyUpdate { faucet_amount: Some(100), transfer_fee_bps: Some(500), ..Default::default() },
    )
    .await
    .unwrap();

    let member_a = lbm_crypto::signatures::Ed25519KeyPair::generate();
    let member_a_pub = member_a.public_key().to_base64();
    node.member_add(&group_id, &member_a_pub, MemberRole::Member).await.unwrap();

    node.mint(&group_id, &node.sign_pub(), 1_000).await.unwrap();
    node.transfer(&group_id, &member_a_pub, 200).await.unwrap();

    let handle = node.group(&group_id).await.unwrap();
    let group = handle.lock().await;
    let state = group.chain.state();

    // 5% of 200 = 10, so the recipient gets 190 and TREASURY gets 10.
    assert_eq!(state.balance_of(&member_a_pub), 190);
    assert_eq!(state.balance_of(lbm_types::TREASURY), 10);
    assert_eq!(state.balance_of(&node.sign_pub()), 1_000 - 200);
    assert!(state.balances_conserved());
}

#[tokio::test]
async fn re_adding_a_removed_member_pays_the_faucet_again() {
    let test_node = spawn_node().await;
    let node = test_node.node;

    let group_id = node.create_group("re-entry", "CREDIT").await.unwrap();
    node.policy_update(&group_id, PolicyUpdate { faucet_amount: Some(50), ..Default::default() }).await.unwrap();

    let member = lbm_crypto::signatures::Ed25519KeyPair::generate();
    let member_pub = member.public_key().to_base64();

    node.member_add(&group_id, &member_pub, MemberRole::Member).await.unwrap();
    node.member_remove(&group_id, &member_pub).await.unwrap();
    node.member_add(&group_id, &member_pub, MemberRole::Member).await.unwrap();

    let handle = node.group(&group_id).await.unwrap();
    let state = handle.lock().await.chain.state().clone();
    assert_eq!(state.balance_of(&member_pub), 100);
}

#[tokio::test]
async fn claim_and_retract_round_trip_through_the_graph() {
    let test_node = spawn_node().await;
    let node = test_node.node;

    let group_id = node.create_group("notes", "CREDIT").await.unwrap();
    let hash = node.put_claim_artifact(&group_id, "tokio select basics", vec!["tokio".into()]).unwrap();
    node.claim(&group_id, &hash).await.unwrap();

    let hits = node.search_claims(&group_id, "tokio select", 5, false).await.unwrap();
    assert_eq!(hits.len(), 1);

    node.retract(&group_id, &hash).await.unwrap();
    assert!(node.search_claims(&group_id, "tokio select", 5, false).await.unwrap().is_empty());
    assert_eq!(node.search_claims(&group_id, "tokio select", 5, true).await.unwrap().len(), 1);
}
