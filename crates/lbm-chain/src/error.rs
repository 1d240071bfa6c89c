//! Chain and state-machine error type.

use thiserror::Error;

/// Why a candidate block or transaction was rejected. Each variant names the
/// first failed check (§4.1 validation order) — the chain never partially
/// applies a block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A required field was malformed or out of range.
    #[error("malformed block: {0}")]
    Malformed(String),
    /// `height != head.height + 1`.
    #[error("bad height: expected {expected}, got {actual}")]
    BadHeight {
        /// Height the chain expects next.
        expected: u64,
        /// Height the candidate block carried.
        actual: u64,
    },
    /// `prev != hash(head)`.
    #[error("bad prev hash")]
    BadPrev,
    /// `group_id` does not match the chain's genesis group id.
    #[error("group id mismatch")]
    GroupMismatch,
    /// Block carries more than [`lbm_types::MAX_TXS_PER_BLOCK`] transactions.
    #[error("too many transactions: {0}")]
    TooManyTransactions(usize),
    /// Canonical encoding exceeds [`lbm_types::MAX_BLOCK_ENCODED_BYTES`].
    #[error("block too large: {0} bytes")]
    BlockTooLarge(usize),
    /// Ed25519 verification against `author` failed.
    #[error("bad signature")]
    BadSignature,
    /// The block's author is not a current member.
    #[error("author is not a member")]
    AuthorNotMember,
    /// `ts_ms` went backward relative to the previous block.
    #[error("timestamp not monotone")]
    TimestampNotMonotone,
    /// `ts_ms` is more than the allowed clock drift in the future.
    #[error("timestamp too far in the future")]
    TimestampTooFarAhead,
    /// A transaction requiring admin rights was submitted by a non-admin.
    #[error("not an admin: {0}")]
    NotAdmin(String),
    /// A transaction requiring membership was submitted by a non-member.
    #[error("not a member: {0}")]
    NotMember(String),
    /// An amount, fee, or cap field was invalid or would overflow a cap.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// Insufficient balance to cover a transfer/purchase plus its fee.
    #[error("insufficient balance")]
    InsufficientBalance,
    /// `total_supply` or an account balance would exceed a configured cap.
    #[error("cap exceeded: {0}")]
    CapExceeded(String),
    /// `from != block.author` on a transfer.
    #[error("transfer sender must be the block author")]
    TransferSenderMismatch,
    /// `from == to` on a transfer.
    #[error("cannot transfer to self")]
    TransferToSelf,
    /// `policy_update` carried no field changes.
    #[error("empty policy update")]
    EmptyPolicyUpdate,
    /// An offer id was already in use, or the referenced offer doesn't exist.
    #[error("offer error: {0}")]
    Offer(String),
    /// Caller is not the offer's seller nor an admin.
    #[error("not authorized to close this offer")]
    NotSellerOrAdmin,
    /// A field (tag length, title length, tag count) exceeded its size bound.
    #[error("field too large: {0}")]
    FieldTooLarge(String),
    /// `genesis` appeared somewhere other than the single transaction of
    /// height 0, or height 0 held something other than exactly one genesis.
    #[error("invalid genesis placement")]
    InvalidGenesis,
    /// Canonicalization/hashing failed.
    #[error("canonical encoding error: {0}")]
    Canonical(String),
}

impl From<lbm_types::canonical::CanonicalError> for ChainError {
    fn from(e: lbm_types::canonical::CanonicalError) -> Self {
        ChainError::Canonical(e.to_string())
    }
}

impl From<ChainError> for lbm_types::errors::LbmError {
    fn from(e: ChainError) -> Self {
        match &e {
            ChainError::AuthorNotMember | ChainError::NotAdmin(_) | ChainError::NotMember(_) | ChainError::NotSellerOrAdmin => {
                lbm_types::errors::LbmError::Authorization(e.to_string())
            }
            ChainError::Malformed(_)
            | ChainError::TooManyTransactions(_)
            | ChainError::BlockTooLarge(_)
            | ChainError::InvalidAmount(_)
            | ChainError::EmptyPolicyUpdate
            | ChainError::FieldTooLarge(_)
            | ChainError::TransferToSelf => lbm_types::errors::LbmError::Validation(e.to_string()),
            ChainError::Canonical(_) => lbm_types::errors::LbmError::Internal(e.to_string()),
            _ => lbm_types::errors::LbmError::StateMachine(e.to_string()),
        }
    }
}
