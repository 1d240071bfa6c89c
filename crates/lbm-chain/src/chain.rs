//! The per-group signed chain: block validation, append, and snapshot
//! restore. See [`crate::validate`] for per-transaction semantics.

use serde::{Deserialize, Serialize};

use lbm_crypto::signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use lbm_types::{
    canonical, Block, GroupState, Policy, Transaction, MAX_BLOCK_ENCODED_BYTES, MAX_CLOCK_DRIFT_MS,
    MAX_TXS_PER_BLOCK,
};

use crate::error::ChainError;
use crate::validate::apply_transaction;

/// All-zero hash used as `prev` on the genesis block.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The wire/storage shape of a chain snapshot: `{blocks, head, state}` per
/// §6. `head` and `state` are redundant with `blocks` (both are recomputed
/// by [`Chain::from_snapshot`]) but are carried on the wire for direct
/// inspection without replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Every block from genesis to head, in order.
    pub blocks: Vec<Block>,
    /// The last block, duplicated for convenience.
    pub head: Option<Block>,
    /// The derived state after folding every block.
    pub state: GroupState,
}

/// A group's append-only signed chain and its derived state.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    state: GroupState,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl Chain {
    /// An empty chain awaiting its genesis block.
    pub fn new_empty() -> Self {
        Chain { blocks: Vec::new(), state: GroupState::default() }
    }

    /// Build and sign a genesis block installing `founder` as the sole
    /// admin-member with default policy (`name`, `currency`, everything
    /// else zero/`None`).
    pub fn make_genesis(
        name: &str,
        currency: &str,
        founder: &Ed25519KeyPair,
    ) -> Result<Block, ChainError> {
        let founder_pub = founder.public_key().to_base64();
        let tx = Transaction::Genesis {
            name: name.to_string(),
            currency: currency.to_string(),
            creator_pub: founder_pub.clone(),
        };

        let group_id_seed = Block {
            group_id: String::new(),
            height: 0,
            prev: ZERO_HASH.to_string(),
            ts_ms: now_ms(),
            author: founder_pub.clone(),
            txs: vec![tx.clone()],
            sig: None,
        };
        let group_id = canonical::hash_obj_hex(&group_id_seed)?;

        let mut unsigned = Block {
            group_id,
            height: 0,
            prev: ZERO_HASH.to_string(),
            ts_ms: group_id_seed.ts_ms,
            author: founder_pub,
            txs: vec![tx],
            sig: None,
        };
        let sig = founder.sign(&unsigned.signing_bytes()?);
        unsigned.sig = Some(sig.to_base64());
        Ok(unsigned)
    }

    /// The chain's group id, once a genesis block has been appended.
    pub fn group_id(&self) -> Option<&str> {
        self.blocks.first().map(|b| b.group_id.as_str())
    }

    /// The most recently appended block.
    pub fn head(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Current chain height (number of blocks; genesis is height 0, so an
    /// empty chain reports `None`).
    pub fn height(&self) -> Option<u64> {
        self.head().map(|b| b.height)
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Read-only view of the derived group state.
    pub fn state(&self) -> &GroupState {
        &self.state
    }

    /// Validate and apply `block` onto the current head. On any failure the
    /// chain is left completely unchanged.
    pub fn append(&mut self, block: Block) -> Result<(), ChainError> {
        let new_state = self.validate_candidate(&block)?;
        self.blocks.push(block);
        self.state = new_state;
        Ok(())
    }

    /// Run the full §4.1 validation order against `block` without mutating
    /// `self`; returns the shadow state the block would produce.
    fn validate_candidate(&self, block: &Block) -> Result<GroupState, ChainError> {
        let is_genesis = self.blocks.is_empty();

        // (1) shape
        if is_genesis {
            if block.height != 0 {
                return Err(ChainError::BadHeight { expected: 0, actual: block.height });
            }
            if block.prev != ZERO_HASH {
                return Err(ChainError::BadPrev);
            }
        } else {
            let head = self.head().expect("non-empty chain has a head");
            let expected_height = head.height + 1;
            if block.height != expected_height {
                return Err(ChainError::BadHeight { expected: expected_height, actual: block.height });
            }
            let head_id = head.block_id()?;
            if block.prev != head_id {
                return Err(ChainError::BadPrev);
            }
            if block.group_id != head.group_id {
                return Err(ChainError::GroupMismatch);
            }
        }

        // (2) size bounds
        if block.txs.len() > MAX_TXS_PER_BLOCK {
            return Err(ChainError::TooManyTransactions(block.txs.len()));
        }
        let encoded = canonical::canonical_json(block)?;
        if encoded.len() > MAX_BLOCK_ENCODED_BYTES {
            return Err(ChainError::BlockTooLarge(encoded.len()));
        }

        // (3) signature
        let sig_b64 = block.sig.as_ref().ok_or_else(|| ChainError::Malformed("missing signature".into()))?;
        let pubkey = Ed25519PublicKey::from_base64(&block.author)
            .map_err(|_| ChainError::Malformed("bad author public key".into()))?;
        let sig = Ed25519Signature::from_base64(sig_b64)
            .map_err(|_| ChainError::Malformed("bad signature encoding".into()))?;
        pubkey
            .verify(&block.signing_bytes()?, &sig)
            .map_err(|_| ChainError::BadSignature)?;

        // (4) author is a member (skip for genesis: membership is established by it)
        if !is_genesis && !self.state.members.contains(&block.author) {
            return Err(ChainError::AuthorNotMember);
        }

        // (5) timestamp bounds
        let now = now_ms();
        if block.ts_ms > now + MAX_CLOCK_DRIFT_MS {
            return Err(ChainError::TimestampTooFarAhead);
        }
        if !is_genesis {
            let head = self.head().expect("non-empty chain has a head");
            if block.ts_ms < head.ts_ms {
                return Err(ChainError::TimestampNotMonotone);
            }
        }

        // (6) apply each transaction to a shadow state
        let mut shadow = self.state.clone();
        if is_genesis {
            if block.txs.len() != 1 {
                return Err(ChainError::InvalidGenesis);
            }
            match &block.txs[0] {
                Transaction::Genesis { name, currency, creator_pub } => {
                    if creator_pub != &block.author {
                        return Err(ChainError::InvalidGenesis);
                    }
                    shadow.policy = Policy { name: name.clone(), currency: currency.clone(), ..Policy::default() };
                    shadow.members.insert(creator_pub.clone());
                    shadow.admins.insert(creator_pub.clone());
                }
                _ => return Err(ChainError::InvalidGenesis),
            }
        } else {
            for tx in &block.txs {
                if matches!(tx, Transaction::Genesis { .. }) {
                    return Err(ChainError::InvalidGenesis);
                }
                apply_transaction(&mut shadow, tx, &block.author)?;
            }
        }

        if !shadow.balances_conserved() {
            return Err(ChainError::InvalidAmount("balance conservation violated".into()));
        }

        Ok(shadow)
    }

    /// Serialize the whole chain (blocks + derived state) for persistence
    /// or transfer.
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            blocks: self.blocks.clone(),
            head: self.blocks.last().cloned(),
            state: self.state.clone(),
        }
    }

    /// Restore a chain by replaying `snapshot.blocks` from height 0 through
    /// the state machine — deterministic, so the result is bitwise-identical
    /// to the chain that produced the snapshot regardless of what
    /// `snapshot.state` claimed.
    pub fn from_snapshot(snapshot: ChainSnapshot) -> Result<Self, ChainError> {
        let mut chain = Chain::new_empty();
        for block in snapshot.blocks {
            chain.append(block)?;
        }
        Ok(chain)
    }

    /// Would replacing this chain's blocks with `candidate` be accepted by
    /// the replace-if-longer-and-valid fork-resolution policy (§4.1)? On
    /// success, returns the `Chain` the replacement would produce without
    /// mutating `self`.
    pub fn try_replace_with(&self, candidate_blocks: &[Block]) -> Result<Chain, ChainError> {
        if let (Some(local_genesis), Some(candidate_genesis)) = (self.blocks.first(), candidate_blocks.first()) {
            if local_genesis.group_id != candidate_genesis.group_id {
                return Err(ChainError::GroupMismatch);
            }
        }
        let candidate_height = candidate_blocks.last().map(|b| b.height);
        let local_height = self.height();
        if candidate_height.is_none() || candidate_height <= local_height {
            return Err(ChainError::Malformed("candidate chain is not longer than the local one".into()));
        }

        let mut replacement = Chain::new_empty();
        for block in candidate_blocks {
            replacement.append(block.clone())?;
        }
        Ok(replacement)
    }

    /// If `self` already holds a chain, and `candidate_blocks`' block at the
    /// local head's height matches the local head's `block_id`, append the
    /// suffix; returns the appended count. Fails (without mutating `self`)
    /// if the suffix doesn't validate.
    pub fn try_extend_with_suffix(&mut self, candidate_blocks: &[Block]) -> Result<usize, ChainError> {
        let head = self.head().ok_or_else(|| ChainError::Malformed("local chain has no head".into()))?;
        let head_height = head.height;
        let head_id = head.block_id()?;

        let at_head = candidate_blocks
            .iter()
            .find(|b| b.height == head_height)
            .ok_or_else(|| ChainError::Malformed("candidate chain does not cover local head height".into()))?;
        if at_head.block_id()? != head_id {
            return Err(ChainError::Malformed("candidate diverges at local head".into()));
        }

        let suffix: Vec<Block> = candidate_blocks
            .iter()
            .filter(|b| b.height > head_height)
            .cloned()
            .collect();

        let mut trial = self.clone();
        for block in &suffix {
            trial.append(block.clone())?;
        }
        *self = trial;
        Ok(suffix.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbm_types::MemberRole;

    fn new_chain_with_founder(faucet: u64) -> (Chain, Ed25519KeyPair, Ed25519KeyPair) {
        let founder = Ed25519KeyPair::generate();
        let genesis = Chain::make_genesis("G", "CREDIT", &founder).unwrap();
        let mut chain = Chain::new_empty();
        chain.append(genesis).unwrap();

        let member = Ed25519KeyPair::generate();
        let mut block = sign_block(
            &chain,
            &founder,
            vec![
                Transaction::PolicyUpdate {
                    updates: lbm_types::PolicyUpdate { faucet_amount: Some(faucet), ..Default::default() },
                },
                Transaction::MemberAdd { pub_key: member.public_key().to_base64(), role: MemberRole::Member },
            ],
        );
        block.sig = Some(founder.sign(&block.signing_bytes().unwrap()).to_base64());
        chain.append(block).unwrap();
        (chain, founder, member)
    }

    fn sign_block(chain: &Chain, author: &Ed25519KeyPair, txs: Vec<Transaction>) -> Block {
        let head = chain.head().unwrap();
        let mut block = Block {
            group_id: chain.group_id().unwrap().to_string(),
            height: head.height + 1,
            prev: head.block_id().unwrap(),
            ts_ms: head.ts_ms + 1,
            author: author.public_key().to_base64(),
            txs,
            sig: None,
        };
        block.sig = Some(author.sign(&block.signing_bytes().unwrap()).to_base64());
        block
    }

    #[test]
    fn genesis_and_faucet() {
        let (chain, founder, member) = new_chain_with_founder(100);
        assert_eq!(chain.state().balance_of(&member.public_key().to_base64()), 100);
        assert_eq!(chain.state().total_supply, 100);
        assert!(chain.state().admins.contains(&founder.public_key().to_base64()));
    }

    #[test]
    fn transfer_with_fee() {
        let (mut chain, founder, member) = new_chain_with_founder(0);
        let member_pub = member.public_key().to_base64();
        let founder_pub = founder.public_key().to_base64();

        let block = sign_block(&chain, &founder, vec![Transaction::Mint { to: member_pub.clone(), amount: 1000 }]);
        chain.append(block).unwrap();

        let block = sign_block(
            &chain,
            &founder,
            vec![Transaction::PolicyUpdate {
                updates: lbm_types::PolicyUpdate { transfer_fee_bps: Some(1000), ..Default::default() },
            }],
        );
        chain.append(block).unwrap();

        let block = sign_block(
            &chain,
            &member,
            vec![Transaction::Transfer { from: member_pub.clone(), to: founder_pub.clone(), amount: 100 }],
        );
        chain.append(block).unwrap();

        assert_eq!(chain.state().balance_of(&member_pub), 890);
        assert_eq!(chain.state().balance_of(&founder_pub), 100);
        assert_eq!(chain.state().balance_of(lbm_types::TREASURY), 10);
    }

    #[test]
    fn snapshot_roundtrip_is_deterministic() {
        let (chain, _founder, _member) = new_chain_with_founder(50);
        let snap = chain.snapshot();
        let restored = Chain::from_snapshot(snap).unwrap();
        assert_eq!(restored.state().balances, chain.state().balances);
        assert_eq!(restored.state().members, chain.state().members);
        assert_eq!(restored.state().policy, chain.state().policy);
        assert_eq!(restored.state().total_supply, chain.state().total_supply);
    }

    #[test]
    fn rejects_wrong_height() {
        let (chain, founder, _member) = new_chain_with_founder(0);
        let mut block = sign_block(&chain, &founder, vec![]);
        block.height += 1;
        block.sig = Some(founder.sign(&block.signing_bytes().unwrap()).to_base64());
        let mut chain2 = chain.clone();
        assert!(matches!(chain2.append(block), Err(ChainError::BadHeight { .. })));
    }

    #[test]
    fn rejects_bad_signature() {
        let (chain, founder, _member) = new_chain_with_founder(0);
        let mut block = sign_block(&chain, &founder, vec![]);
        block.sig = Some(founder.sign(b"not the block bytes").to_base64());
        let mut chain2 = chain.clone();
        assert!(matches!(chain2.append(block), Err(ChainError::BadSignature)));
    }

    #[test]
    fn rejects_author_not_member() {
        let (chain, _founder, _member) = new_chain_with_founder(0);
        let outsider = Ed25519KeyPair::generate();
        let block = sign_block(&chain, &outsider, vec![]);
        let mut chain2 = chain.clone();
        assert!(matches!(chain2.append(block), Err(ChainError::AuthorNotMember)));
    }

    #[test]
    fn rejects_transfer_exceeding_balance() {
        let (chain, founder, member) = new_chain_with_founder(10);
        let member_pub = member.public_key().to_base64();
        let founder_pub = founder.public_key().to_base64();
        let block = sign_block(
            &chain,
            &member,
            vec![Transaction::Transfer { from: member_pub, to: founder_pub, amount: 1000 }],
        );
        let mut chain2 = chain.clone();
        assert!(matches!(chain2.append(block), Err(ChainError::InsufficientBalance)));
    }

    #[test]
    fn rejects_non_admin_mint() {
        let (chain, _founder, member) = new_chain_with_founder(0);
        let member_pub = member.public_key().to_base64();
        let block = sign_block(&chain, &member, vec![Transaction::Mint { to: member_pub, amount: 10 }]);
        let mut chain2 = chain.clone();
        assert!(matches!(chain2.append(block), Err(ChainError::NotAdmin(_))));
    }

    #[test]
    fn block_id_matches_prev_of_next_block() {
        let (chain, founder, _member) = new_chain_with_founder(0);
        let head = chain.head().unwrap();
        let next = sign_block(&chain, &founder, vec![]);
        assert_eq!(next.prev, head.block_id().unwrap());
    }

    #[test]
    fn fork_resolution_replaces_with_longer_valid_chain() {
        let (mut local, founder, _member) = new_chain_with_founder(0);
        let mut remote = local.clone();
        for _ in 0..3 {
            let block = sign_block(&remote, &founder, vec![]);
            remote.append(block).unwrap();
        }
        assert!(remote.height().unwrap() > local.height().unwrap());
        let replaced = local.try_replace_with(remote.blocks()).unwrap();
        local = replaced;
        assert_eq!(local.height(), remote.height());
    }

    #[test]
    fn claim_and_retract_do_not_affect_balances() {
        let (chain, _founder, member) = new_chain_with_founder(0);
        let mut chain = chain;
        let block = sign_block(&chain, &member, vec![Transaction::Claim { artifact_hash: "deadbeef".into() }]);
        chain.append(block).unwrap();
        let block = sign_block(&chain, &member, vec![Transaction::Retract { artifact_hash: "deadbeef".into() }]);
        chain.append(block).unwrap();
        assert!(chain.state().balances_conserved());
    }

    #[test]
    fn offer_purchase_pays_seller_and_fee() {
        let (chain, founder, member) = new_chain_with_founder(0);
        let mut chain = chain;
        let founder_pub = founder.public_key().to_base64();
        let member_pub = member.public_key().to_base64();

        let block = sign_block(&chain, &founder, vec![Transaction::Mint { to: member_pub.clone(), amount: 1000 }]);
        chain.append(block).unwrap();

        let block = sign_block(
            &chain,
            &founder,
            vec![Transaction::OfferCreate {
                offer_id: "offer1".into(),
                title: "knowledge".into(),
                price: 200,
                tags: vec!["build".into()],
                package_hash: "abc123".into(),
            }],
        );
        chain.append(block).unwrap();

        let block = sign_block(
            &chain,
            &member,
            vec![Transaction::OfferPurchase { offer_id: "offer1".into(), buyer: member_pub.clone() }],
        );
        chain.append(block).unwrap();

        assert_eq!(chain.state().balance_of(&founder_pub), 200);
        assert_eq!(chain.state().balance_of(&member_pub), 800);
        assert!(chain.state().grants.contains(&format!("offer1:{member_pub}")));
    }
}
