use serde::{Deserialize, Serialize};

use inboxd_store::UniqueIdent;

/// A user account. Provisioning/destruction is an external collaborator;
/// this struct is the record the message-management core reads and mutates
/// (`quota`, `storageUsed`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UniqueIdent,
    /// Normalized lookup key.
    pub unameview: String,
    /// Bytes; 0 means unlimited.
    pub quota: u64,
    /// May drift negative under concurrent `$inc` races; always clamp at
    /// presentation time, never internally.
    pub storage_used: i64,
    /// Public key of the optional encryption collaborator, opaque to us.
    pub subscriber_pubkey: Option<Vec<u8>>,
    /// PHC-format argon2 hash, `None` for an account provisioned without a
    /// password (not authenticatable via `on_auth`).
    pub password_hash: Option<String>,
}

impl User {
    pub fn new(id: UniqueIdent, unameview: impl Into<String>, quota: u64) -> Self {
        Self {
            id,
            unameview: unameview.into(),
            quota,
            storage_used: 0,
            subscriber_pubkey: None,
            password_hash: None,
        }
    }

    /// `{root: "", quota, storageUsed: max(0, storageUsed)}`.
    pub fn quota_root(&self) -> QuotaRoot {
        QuotaRoot {
            root: String::new(),
            quota: self.quota,
            storage_used: self.storage_used.max(0) as u64,
        }
    }

    pub fn over_quota(&self) -> bool {
        self.quota != 0 && self.storage_used.max(0) as u64 > self.quota
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaRoot {
    pub root: String,
    pub quota: u64,
    pub storage_used: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_root_clamps_negative_drift() {
        let mut u = User::new(inboxd_store::gen_ident(), "alice", 1000);
        u.storage_used = -50;
        assert_eq!(u.quota_root().storage_used, 0);
    }
}
