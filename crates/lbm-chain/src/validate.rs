//! Transaction semantics: validating and applying one transaction against a
//! shadow copy of group state. Transactions are a tagged sum type (§4.1);
//! dispatch is exhaustive pattern matching, never subclass polymorphism, so
//! the compiler flags any unhandled kind.

use lbm_types::{
    fee_for, GroupState, MemberRole, Offer, PolicyUpdate, Transaction, MAX_OFFER_TITLE_BYTES,
    MAX_TAGS, MAX_TAG_LENGTH, MAX_TOKEN_VALUE, TREASURY,
};

use crate::error::ChainError;

fn is_admin(state: &GroupState, pub_key: &str) -> bool {
    state.admins.contains(pub_key)
}

fn is_member(state: &GroupState, pub_key: &str) -> bool {
    state.members.contains(pub_key)
}

fn require_admin(state: &GroupState, pub_key: &str) -> Result<(), ChainError> {
    if is_admin(state, pub_key) {
        Ok(())
    } else {
        Err(ChainError::NotAdmin(pub_key.to_string()))
    }
}

fn require_member(state: &GroupState, pub_key: &str) -> Result<(), ChainError> {
    if is_member(state, pub_key) {
        Ok(())
    } else {
        Err(ChainError::NotMember(pub_key.to_string()))
    }
}

fn check_account_cap(state: &GroupState, pub_key: &str, new_balance: u64) -> Result<(), ChainError> {
    if let Some(cap) = state.policy.max_account_balance {
        if pub_key != TREASURY && new_balance > cap {
            return Err(ChainError::CapExceeded(format!(
                "account {pub_key} balance {new_balance} exceeds cap {cap}"
            )));
        }
    }
    Ok(())
}

fn check_supply_cap(state: &GroupState, new_supply: u64) -> Result<(), ChainError> {
    if let Some(cap) = state.policy.max_total_supply {
        if new_supply > cap {
            return Err(ChainError::CapExceeded(format!(
                "total supply {new_supply} exceeds cap {cap}"
            )));
        }
    }
    Ok(())
}

/// Credit `pub_key` with `amount`, increasing `total_supply`. Fails if
/// either cap would be breached.
fn mint_to(state: &mut GroupState, pub_key: &str, amount: u64) -> Result<(), ChainError> {
    let new_balance = state.balance_of(pub_key) + amount;
    let new_supply = state.total_supply + amount;
    check_account_cap(state, pub_key, new_balance)?;
    check_supply_cap(state, new_supply)?;
    state.balances.insert(pub_key.to_string(), new_balance);
    state.total_supply = new_supply;
    Ok(())
}

/// Would crediting `pub_key` with `amount` breach either cap? Used for the
/// faucet, which silently skips rather than failing the whole transaction.
fn would_breach_caps(state: &GroupState, pub_key: &str, amount: u64) -> bool {
    let new_balance = state.balance_of(pub_key) + amount;
    let new_supply = state.total_supply + amount;
    if let Some(cap) = state.policy.max_account_balance {
        if pub_key != TREASURY && new_balance > cap {
            return true;
        }
    }
    if let Some(cap) = state.policy.max_total_supply {
        if new_supply > cap {
            return true;
        }
    }
    false
}

/// Move `amount` from `from` to `to` plus `fee` to [`TREASURY`], per the
/// transfer/purchase fee semantics in §4.1. Does not check `from != to` or
/// `from == author` — callers enforce those where relevant.
fn move_funds(state: &mut GroupState, from: &str, to: &str, amount: u64, bps: u32) -> Result<(), ChainError> {
    let fee = fee_for(amount, bps);
    let total_debit = amount
        .checked_add(fee)
        .ok_or_else(|| ChainError::InvalidAmount("amount + fee overflows".into()))?;
    let from_balance = state.balance_of(from);
    if from_balance < total_debit {
        return Err(ChainError::InsufficientBalance);
    }

    let to_new = state.balance_of(to) + amount;
    check_account_cap(state, to, to_new)?;
    let treasury_new = if fee > 0 {
        state.balance_of(TREASURY) + fee
    } else {
        state.balance_of(TREASURY)
    };
    if fee > 0 {
        check_account_cap(state, TREASURY, treasury_new)?;
    }

    state.balances.insert(from.to_string(), from_balance - total_debit);
    state.balances.insert(to.to_string(), to_new);
    if fee > 0 {
        state.balances.insert(TREASURY.to_string(), treasury_new);
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), ChainError> {
    if tags.len() > MAX_TAGS {
        return Err(ChainError::FieldTooLarge(format!("{} tags exceeds max {MAX_TAGS}", tags.len())));
    }
    for t in tags {
        if t.len() > MAX_TAG_LENGTH {
            return Err(ChainError::FieldTooLarge(format!("tag '{t}' exceeds {MAX_TAG_LENGTH} bytes")));
        }
    }
    Ok(())
}

fn validate_policy_update(update: &PolicyUpdate, current_supply: u64) -> Result<(), ChainError> {
    if update.is_empty() {
        return Err(ChainError::EmptyPolicyUpdate);
    }
    if let Some(v) = update.faucet_amount {
        if v > MAX_TOKEN_VALUE {
            return Err(ChainError::InvalidAmount("faucet_amount exceeds max token value".into()));
        }
    }
    if let Some(v) = update.claim_reward_amount {
        if v > MAX_TOKEN_VALUE {
            return Err(ChainError::InvalidAmount("claim_reward_amount exceeds max token value".into()));
        }
    }
    if let Some(bps) = update.transfer_fee_bps {
        if bps > 5000 {
            return Err(ChainError::InvalidAmount("transfer_fee_bps must be <= 5000".into()));
        }
    }
    if let Some(cap) = update.max_total_supply {
        if cap < current_supply {
            return Err(ChainError::InvalidAmount(
                "max_total_supply cannot be set below current total supply".into(),
            ));
        }
    }
    Ok(())
}

/// Apply `tx`, authored by `author_pub` in a block timestamped `block_ts_ms`,
/// to `state` in place. Callers run this against a shadow copy and only
/// promote it to live state if the whole block's transactions all succeed.
pub fn apply_transaction(
    state: &mut GroupState,
    tx: &Transaction,
    author_pub: &str,
) -> Result<(), ChainError> {
    match tx {
        Transaction::Genesis { .. } => Err(ChainError::InvalidGenesis),

        Transaction::MemberAdd { pub_key, role } => {
            require_admin(state, author_pub)?;
            let was_member = state.members.contains(pub_key);
            state.members.insert(pub_key.clone());
            match role {
                MemberRole::Admin => {
                    state.admins.insert(pub_key.clone());
                }
                MemberRole::Member => {
                    state.admins.remove(pub_key);
                }
            }
            let faucet = state.policy.faucet_amount;
            if !was_member && faucet > 0 && !would_breach_caps(state, pub_key, faucet) {
                mint_to(state, pub_key, faucet)?;
            }
            Ok(())
        }

        Transaction::MemberRemove { pub_key } => {
            require_admin(state, author_pub)?;
            state.members.remove(pub_key);
            state.admins.remove(pub_key);
            Ok(())
        }

        Transaction::Mint { to, amount } => {
            require_admin(state, author_pub)?;
            if *amount == 0 || *amount > MAX_TOKEN_VALUE {
                return Err(ChainError::InvalidAmount(format!(
                    "mint amount {amount} out of range"
                )));
            }
            mint_to(state, to, *amount)
        }

        Transaction::Transfer { from, to, amount } => {
            if from != author_pub {
                return Err(ChainError::TransferSenderMismatch);
            }
            if from == to {
                return Err(ChainError::TransferToSelf);
            }
            move_funds(state, from, to, *amount, state.policy.transfer_fee_bps)
        }

        Transaction::PolicyUpdate { updates } => {
            require_admin(state, author_pub)?;
            validate_policy_update(updates, state.total_supply)?;
            if let Some(v) = updates.faucet_amount {
                state.policy.faucet_amount = v;
            }
            if let Some(v) = updates.claim_reward_amount {
                state.policy.claim_reward_amount = v;
            }
            if let Some(v) = updates.transfer_fee_bps {
                state.policy.transfer_fee_bps = v;
            }
            if let Some(v) = updates.max_total_supply {
                state.policy.max_total_supply = Some(v);
            }
            if let Some(v) = updates.max_account_balance {
                state.policy.max_account_balance = Some(v);
            }
            Ok(())
        }

        Transaction::Claim { artifact_hash } => {
            require_member(state, author_pub)?;
            if artifact_hash.is_empty() {
                return Err(ChainError::Malformed("empty artifact_hash".into()));
            }
            let reward = state.policy.claim_reward_amount;
            if reward > 0 && !would_breach_caps(state, author_pub, reward) {
                mint_to(state, author_pub, reward)?;
            }
            Ok(())
        }

        Transaction::Retract { artifact_hash } => {
            require_member(state, author_pub)?;
            if artifact_hash.is_empty() {
                return Err(ChainError::Malformed("empty artifact_hash".into()));
            }
            Ok(())
        }

        Transaction::OfferCreate { offer_id, title, price, tags, package_hash } => {
            require_member(state, author_pub)?;
            if offer_id.is_empty() || package_hash.is_empty() {
                return Err(ChainError::Malformed("empty offer_id or package_hash".into()));
            }
            if title.len() > MAX_OFFER_TITLE_BYTES {
                return Err(ChainError::FieldTooLarge(format!(
                    "offer title exceeds {MAX_OFFER_TITLE_BYTES} bytes"
                )));
            }
            validate_tags(tags)?;
            if state.offers.contains_key(offer_id) {
                return Err(ChainError::Offer(format!("offer {offer_id} already exists")));
            }
            state.offers.insert(
                offer_id.clone(),
                Offer {
                    seller: author_pub.to_string(),
                    title: title.clone(),
                    price: *price,
                    currency: state.policy.currency.clone(),
                    package_hash: package_hash.clone(),
                    tags: tags.clone(),
                    active: true,
                },
            );
            Ok(())
        }

        Transaction::OfferClose { offer_id } => {
            let offer = state
                .offers
                .get(offer_id)
                .ok_or_else(|| ChainError::Offer(format!("offer {offer_id} not found")))?;
            if offer.seller != author_pub && !is_admin(state, author_pub) {
                return Err(ChainError::NotSellerOrAdmin);
            }
            state.offers.get_mut(offer_id).unwrap().active = false;
            Ok(())
        }

        Transaction::OfferPurchase { offer_id, buyer } => {
            if buyer != author_pub {
                return Err(ChainError::TransferSenderMismatch);
            }
            require_member(state, buyer)?;
            let offer = state
                .offers
                .get(offer_id)
                .ok_or_else(|| ChainError::Offer(format!("offer {offer_id} not found")))?
                .clone();
            if !offer.active {
                return Err(ChainError::Offer(format!("offer {offer_id} is not active")));
            }
            let grant_key = lbm_types::GroupState::grant_key(offer_id, buyer);
            if state.grants.contains(&grant_key) {
                return Err(ChainError::Offer(format!("offer {offer_id} already purchased by {buyer}")));
            }
            move_funds(state, buyer, &offer.seller, offer.price, state.policy.transfer_fee_bps)?;
            state.grants.insert(grant_key);
            Ok(())
        }
    }
}
