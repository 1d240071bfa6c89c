//! Block and transaction wire types.
//!
//! Transactions are a tagged sum type (`kind` discriminant), matching the
//! spec's explicit preference for exhaustive pattern matching over subclass
//! polymorphism: see `lbm_chain::validate` for the dispatch.

use crate::canonical::{canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};

/// The sentinel balance key that accumulates transfer fees.
pub const TREASURY: &str = "TREASURY";

/// A safety bound on any single token-valued field (`amount`, `faucet_amount`,
/// `claim_reward_amount`, ...), well above any realistic economy but small
/// enough to keep `u64` arithmetic far from overflow.
pub const MAX_TOKEN_VALUE: u64 = 1_000_000_000_000;

/// Maximum transactions carried by one block.
pub const MAX_TXS_PER_BLOCK: usize = 100;

/// Maximum canonical-JSON-encoded size of one block.
pub const MAX_BLOCK_ENCODED_BYTES: usize = 1_000_000;

/// Maximum allowed clock drift, forward or backward, for block and handshake
/// timestamps.
pub const MAX_CLOCK_DRIFT_MS: i64 = 5 * 60 * 1000;

/// Maximum bytes of a claim artifact's `text` field.
pub const MAX_CLAIM_TEXT_BYTES: usize = 64 * 1024;

/// Maximum length of a single tag string.
pub const MAX_TAG_LENGTH: usize = 64;

/// Maximum number of tags on one artifact or offer.
pub const MAX_TAGS: usize = 16;

/// Maximum bytes of an offer's `title` field.
pub const MAX_OFFER_TITLE_BYTES: usize = 200;

/// Role granted to a member by `member_add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Ordinary member: may claim, retract own claims, create/purchase offers.
    Member,
    /// Admin: additionally may add/remove members, mint, update policy, close any offer.
    Admin,
}

/// Per-group tunable economic parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Human-readable group name.
    pub name: String,
    /// Currency label shown alongside balances (purely cosmetic).
    pub currency: String,
    /// Amount credited to a newly (re-)added member, if nonzero.
    pub faucet_amount: u64,
    /// Amount credited to a block's author for each `claim` transaction it contains.
    pub claim_reward_amount: u64,
    /// Fee taken from every `transfer`, in basis points (0..=5000).
    pub transfer_fee_bps: u32,
    /// Optional cap on `total_supply`.
    pub max_total_supply: Option<u64>,
    /// Optional cap on any single account's balance.
    pub max_account_balance: Option<u64>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            name: String::new(),
            currency: "CREDIT".to_string(),
            faucet_amount: 0,
            claim_reward_amount: 0,
            transfer_fee_bps: 0,
            max_total_supply: None,
            max_account_balance: None,
        }
    }
}

/// A sparse set of policy field updates. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    /// New faucet amount.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub faucet_amount: Option<u64>,
    /// New claim reward amount.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub claim_reward_amount: Option<u64>,
    /// New transfer fee, in basis points.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transfer_fee_bps: Option<u32>,
    /// New total supply cap.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_total_supply: Option<u64>,
    /// New per-account balance cap.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_account_balance: Option<u64>,
}

impl PolicyUpdate {
    /// True if this update touches at least one field. An empty update is
    /// rejected by the validator.
    pub fn is_empty(&self) -> bool {
        self.faucet_amount.is_none()
            && self.claim_reward_amount.is_none()
            && self.transfer_fee_bps.is_none()
            && self.max_total_supply.is_none()
            && self.max_account_balance.is_none()
    }
}

/// One entry in a block's transaction list.
///
/// Field names match the canonical wire/storage shape; `pub_key` serializes
/// as `"pub"` because `pub` is a Rust keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    /// Installs the founder as sole admin-member and seeds default policy.
    /// Only ever valid as the single transaction of height-0 block.
    Genesis {
        /// Group display name.
        name: String,
        /// Currency label.
        currency: String,
        /// Founder's signing public key (base64).
        creator_pub: String,
    },
    /// Admin-only: add or re-add a member.
    MemberAdd {
        /// Member's signing public key (base64).
        #[serde(rename = "pub")]
        pub_key: String,
        /// Role to grant.
        role: MemberRole,
    },
    /// Admin-only: remove a member (balance preserved).
    MemberRemove {
        /// Member's signing public key (base64).
        #[serde(rename = "pub")]
        pub_key: String,
    },
    /// Admin-only: credit an account from nothing.
    Mint {
        /// Recipient's signing public key (base64).
        to: String,
        /// Amount to mint; `0 < amount <= MAX_TOKEN_VALUE`.
        amount: u64,
    },
    /// Move funds between accounts; `from` must equal the block author.
    Transfer {
        /// Sender's signing public key (base64). Must equal the block author.
        from: String,
        /// Recipient's signing public key, or [`TREASURY`].
        to: String,
        /// Amount to transfer before fees.
        amount: u64,
    },
    /// Admin-only: change one or more policy fields.
    PolicyUpdate {
        /// The sparse set of fields to change.
        updates: PolicyUpdate,
    },
    /// Member-only: record a claim artifact hash in the context graph.
    Claim {
        /// SHA-256 hex hash of the claim artifact in the CAS.
        artifact_hash: String,
    },
    /// Member-only: mark a previously-claimed artifact retracted.
    Retract {
        /// SHA-256 hex hash of the claim artifact being retracted.
        artifact_hash: String,
    },
    /// Member-only: list a package for sale.
    OfferCreate {
        /// Caller-chosen unique offer identifier.
        offer_id: String,
        /// Human-readable title.
        title: String,
        /// Price in group credit.
        price: u64,
        /// Free-text tags for discovery.
        tags: Vec<String>,
        /// SHA-256 hex hash of the encrypted package artifact in the CAS.
        package_hash: String,
    },
    /// Seller or admin: mark an offer inactive.
    OfferClose {
        /// Offer identifier.
        offer_id: String,
    },
    /// Buyer: purchase an active offer, paying the seller (minus fee).
    OfferPurchase {
        /// Offer identifier.
        offer_id: String,
        /// Buyer's signing public key (base64).
        buyer: String,
    },
}

impl Transaction {
    /// Short machine-readable kind name, for logging and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Transaction::Genesis { .. } => "genesis",
            Transaction::MemberAdd { .. } => "member_add",
            Transaction::MemberRemove { .. } => "member_remove",
            Transaction::Mint { .. } => "mint",
            Transaction::Transfer { .. } => "transfer",
            Transaction::PolicyUpdate { .. } => "policy_update",
            Transaction::Claim { .. } => "claim",
            Transaction::Retract { .. } => "retract",
            Transaction::OfferCreate { .. } => "offer_create",
            Transaction::OfferClose { .. } => "offer_close",
            Transaction::OfferPurchase { .. } => "offer_purchase",
        }
    }
}

/// A signed block: `{group_id, height, prev, ts_ms, author, txs, sig}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 32-byte hex hash identifying the group (equal to `hash(genesis)`).
    pub group_id: String,
    /// Strictly increasing height; 0 is genesis.
    pub height: u64,
    /// SHA-256 hex hash of the canonicalized previous block (all-zero at genesis).
    pub prev: String,
    /// Author-claimed timestamp in Unix milliseconds.
    pub ts_ms: i64,
    /// Author's Ed25519 signing public key (base64).
    pub author: String,
    /// Ordered transactions applied by this block.
    pub txs: Vec<Transaction>,
    /// Base64 Ed25519 signature over [`Block::signing_bytes`]. `None` only
    /// while a block is being constructed, never once appended.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sig: Option<String>,
}

impl Block {
    /// Canonical bytes a signature is computed over: the block with `sig`
    /// cleared.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        let mut unsigned = self.clone();
        unsigned.sig = None;
        canonical_json(&unsigned)
    }

    /// SHA-256 hex of the canonicalized *signed* block — the `block_id`
    /// used as the next block's `prev`.
    pub fn block_id(&self) -> Result<String, CanonicalError> {
        crate::canonical::hash_obj_hex(self)
    }
}

/// Floor-divide fee math: `floor(amount * bps / 10000)`.
pub fn fee_for(amount: u64, bps: u32) -> u64 {
    ((amount as u128) * (bps as u128) / 10_000u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_bytes_exclude_sig() {
        let mut block = Block {
            group_id: "g".into(),
            height: 1,
            prev: "p".into(),
            ts_ms: 0,
            author: "a".into(),
            txs: vec![],
            sig: None,
        };
        let unsigned_bytes = block.signing_bytes().unwrap();
        block.sig = Some("deadbeef".into());
        let still_unsigned_bytes = block.signing_bytes().unwrap();
        assert_eq!(unsigned_bytes, still_unsigned_bytes);
    }

    #[test]
    fn fee_rounds_down() {
        assert_eq!(fee_for(100, 1000), 10);
        assert_eq!(fee_for(99, 1000), 9);
        assert_eq!(fee_for(1, 1), 0);
    }

    #[test]
    fn transaction_kind_names() {
        let tx = Transaction::Claim { artifact_hash: "h".into() };
        assert_eq!(tx.kind_name(), "claim");
    }

    #[test]
    fn member_add_serializes_pub_field() {
        let tx = Transaction::MemberAdd { pub_key: "abc".into(), role: MemberRole::Member };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["pub"], "abc");
        assert_eq!(json["kind"], "member_add");
    }
}
