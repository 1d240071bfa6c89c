//! A WAL transaction staged but never committed must look, after the
//! process "crashes" and the `Wal` is reopened, exactly as if it never
//! happened — this is the crash-atomicity guarantee the node's group
//! mutations (chain_ops, genesis, sync) all depend on.

use lbm_wal::Wal;

use crate::integration::harness::spawn_node;

#[tokio::test]
async fn uncommitted_transaction_is_rolled_back_on_reopen() {
    let test_node = spawn_node().await;
    let node = &test_node.node;

    let group_id = node.create_group("durable-group", "CREDIT").await.unwrap();
    let original: serde_json::Value = lbm_wal::fs::read_json(&node.settings.group_dir(&group_id).join("chain.json")).unwrap();

    // Stage a write (durable in the log) but never call commit/rollback —
    // simulates a crash between `stage` and `commit`.
    {
        let tx = node.wal.begin();
        tx.write_json(&node.settings.group_dir(&group_id).join("chain.json"), &serde_json::json!({"tampered": true}))
            .unwrap();
        std::mem::forget(tx);
    }

    // On-disk content is untouched until a commit record lands.
    let on_disk: serde_json::Value =
        lbm_wal::fs::read_json(&node.settings.group_dir(&group_id).join("chain.json")).unwrap();
    assert_eq!(on_disk, original);

    // Reopening the WAL replays its log: no commit record for that
    // transaction means recovery rolls the staged write back.
    drop(Wal::open(node.settings.wal_dir()).unwrap());

    let after_recovery: serde_json::Value =
        lbm_wal::fs::read_json(&node.settings.group_dir(&group_id).join("chain.json")).unwrap();
    assert_eq!(after_recovery, original);
}

#[tokio::test]
async fn committed_transaction_survives_recompose() {
    let test_node = spawn_node().await;
    let node = test_node.node;
    let settings = node.settings.clone();

    let group_id = node.create_group("recompose-group", "CREDIT").await.unwrap();
    node.mint(&group_id, &node.sign_pub(), 500).await.unwrap();
    drop(node);

    let recomposed = lbm_node::wiring::compose(settings).await.unwrap();
    let handle = recomposed.group(&group_id).await.expect("group survives recompose");
    let group = handle.lock().await;
    assert_eq!(group.chain.state().balance_of(&recomposed.sign_pub()), 500);
}
