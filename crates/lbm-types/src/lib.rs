//! Domain entities shared across every LBM crate: canonical JSON, the
//! chain's block/transaction model, derived group state, CAS metadata,
//! context-graph records, peer bookkeeping, and the shared error taxonomy.

pub mod canonical;
pub mod cas;
pub mod chain;
pub mod errors;
pub mod graph;
pub mod peer;
pub mod state;

pub use canonical::{canonical_json, canonical_json_value, hash_bytes_hex, hash_obj, hash_obj_hex};
pub use cas::{CasMeta, CasStats, Visibility, DEFAULT_MAX_OBJECT_SIZE};
pub use chain::{
    fee_for, Block, MemberRole, Policy, PolicyUpdate, Transaction, MAX_BLOCK_ENCODED_BYTES,
    MAX_CLAIM_TEXT_BYTES, MAX_CLOCK_DRIFT_MS, MAX_OFFER_TITLE_BYTES, MAX_TAGS, MAX_TAG_LENGTH,
    MAX_TOKEN_VALUE, MAX_TXS_PER_BLOCK, TREASURY,
};
pub use errors::{ErrorCode, LbmError};
pub use graph::{ClaimRecord, GraphHit};
pub use peer::{PeerInfo, Subscription};
pub use state::{GroupState, Offer};
