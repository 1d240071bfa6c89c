//! An offer listed by one member is purchased by another through
//! [`lbm_p2p::ports::NodeOps::purchase`] — the only chain mutation reachable
//! over the authenticated P2P wire, used when a buyer's own node cannot host
//! the seller's chain directly.

use lbm_p2p::ports::NodeOps;
use lbm_types::{Block, MemberRole, Transaction};

use crate::integration::harness::spawn_node;

#[tokio::test]
async fn purchase_pays_the_seller_and_records_a_grant() {
    let seller_node = spawn_node().await.node;
    let buyer = lbm_crypto::signatures::Ed25519KeyPair::generate();
    let buyer_pub = buyer.public_key().to_base64();

    let group_id = seller_node.create_group("marketplace", "CREDIT").await.unwrap();
    seller_node.member_add(&group_id, &buyer_pub, MemberRole::Member).await.unwrap();
    seller_node.mint(&group_id, &buyer_pub, 1_000).await.unwrap();

    let package_hash = seller_node.put_package_artifact(&group_id, b"encrypted-bytes-stand-in").unwrap();
    seller_node.offer_create(&group_id, "offer-1", "Calculus notes", 300, vec!["math".into()], &package_hash).await.unwrap();

    // The buyer signs their own `OfferPurchase` block, as if composed on
    // their own node, and submits it as payment proof.
    let handle = seller_node.group(&group_id).await.unwrap();
    let (height, prev) = {
        let group = handle.lock().await;
        let head = group.chain.head().unwrap();
        (head.height + 1, head.block_id().unwrap())
    };
    let mut block = Block {
        group_id: group_id.clone(),
        height,
        prev,
        ts_ms: 0,
        author: buyer_pub.clone(),
        txs: vec![Transaction::OfferPurchase { offer_id: "offer-1".to_string(), buyer: buyer_pub.clone() }],
        sig: None,
    };
    block.ts_ms = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as i64;
    let signing_bytes = block.signing_bytes().unwrap();
    block.sig = Some(buyer.sign(&signing_bytes).to_base64());

    let payment_proof = serde_json::json!({"signed_block": block});
    NodeOps::purchase(&seller_node, "offer-1", &buyer_pub, payment_proof).await.unwrap();

    let group = handle.lock().await;
    let state = group.chain.state();
    assert_eq!(state.balance_of(&buyer_pub), 1_000 - 300);
    assert!(state.grants.contains(&lbm_types::GroupState::grant_key("offer-1", &buyer_pub)));
}

#[tokio::test]
async fn purchase_rejects_a_block_not_authored_by_the_claimed_buyer() {
    let seller_node = spawn_node().await.node;
    let buyer = lbm_crypto::signatures::Ed25519KeyPair::generate();
    let buyer_pub = buyer.public_key().to_base64();
    let impostor_pub = lbm_crypto::signatures::Ed25519KeyPair::generate().public_key().to_base64();

    let group_id = seller_node.create_group("marketplace-2", "CREDIT").await.unwrap();
    seller_node.member_add(&group_id, &buyer_pub, MemberRole::Member).await.unwrap();

    let handle = seller_node.group(&group_id).await.unwrap();
    let (height, prev) = {
        let group = handle.lock().await;
        let head = group.chain.head().unwrap();
        (head.height + 1, head.block_id().unwrap())
    };
    let block = Block {
        group_id: group_id.clone(),
        height,
        prev,
        ts_ms: 0,
        author: buyer_pub.clone(),
        txs: vec![Transaction::OfferPurchase { offer_id: "offer-1".to_string(), buyer: buyer_pub.clone() }],
        sig: None,
    };
    let payment_proof = serde_json::json!({"signed_block": block});

    // Claimed buyer in the call doesn't match the (unsigned, but also
    // mismatched) block's author.
    let result = NodeOps::purchase(&seller_node, "offer-1", &impostor_pub, payment_proof).await;
    assert!(result.is_err());
}
