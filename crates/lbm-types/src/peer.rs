//! Non-canonical bookkeeping state: the peer address book and group
//! subscriptions (`peers.json` / `subscriptions.json`). Neither participates
//! in chain consensus; both are rebuilt best-effort and tolerate loss.

use serde::{Deserialize, Serialize};

/// A remembered peer address and its last known identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Display node id (12-char signing-key prefix), if learned.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node_id: Option<String>,
    /// Signing public key (base64), if learned via handshake.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sign_pub: Option<String>,
    /// Key-agreement public key (base64), if learned via handshake.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enc_pub: Option<String>,
    /// User-assigned label.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alias: Option<String>,
    /// Unix ms of the last successful contact.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_seen_ms: Option<i64>,
    /// Last error message encountered contacting this peer, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_error: Option<String>,
    /// Unix ms when this peer was first remembered.
    pub added_ms: i64,
}

/// A standing subscription to sync one group from one peer on an interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Peer host.
    pub peer_host: String,
    /// Peer port.
    pub peer_port: u16,
    /// Desired interval between syncs, in seconds.
    pub sync_interval_s: u64,
    /// Whether the scheduler should act on this subscription.
    pub enabled: bool,
    /// Unix ms of the last successful sync, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_sync_ms: Option<i64>,
    /// Last error message from a failed sync attempt, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_error: Option<String>,
}

impl Subscription {
    /// Is this subscription due for another sync attempt at `now_ms`,
    /// ignoring backoff?
    pub fn is_due(&self, now_ms: i64) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_sync_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= (self.sync_interval_s as i64) * 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(enabled: bool, last_sync_ms: Option<i64>, interval_s: u64) -> Subscription {
        Subscription {
            peer_host: "h".into(),
            peer_port: 1,
            sync_interval_s: interval_s,
            enabled,
            last_sync_ms,
            last_error: None,
        }
    }

    #[test]
    fn disabled_never_due() {
        assert!(!sub(false, None, 10).is_due(100_000));
    }

    #[test]
    fn never_synced_is_due() {
        assert!(sub(true, None, 10).is_due(0));
    }

    #[test]
    fn due_after_interval_elapses() {
        let s = sub(true, Some(1_000), 10);
        assert!(!s.is_due(1_000 + 9_000));
        assert!(s.is_due(1_000 + 10_000));
    }
}
