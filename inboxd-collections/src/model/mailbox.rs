use std::num::{NonZeroU32, NonZeroU64};

use serde::{Deserialize, Serialize};

use inboxd_store::UniqueIdent;

pub type ImapUid = NonZeroU32;
pub type ModSeq = NonZeroU64;
pub type ImapUidvalidity = NonZeroU32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialUse {
    Inbox,
    Sent,
    Drafts,
    Junk,
    Trash,
    Archive,
    None,
}

impl SpecialUse {
    /// Junk/Trash mailboxes are never `searchable` for a freshly-added
    /// message.
    pub fn excluded_from_search_by_default(self) -> bool {
        matches!(self, SpecialUse::Junk | SpecialUse::Trash)
    }

    pub fn is_junk(self) -> bool {
        matches!(self, SpecialUse::Junk)
    }
}

/// `(user, path)` unique. `uidValidity` is set once at creation and never
/// mutated; `uidNext`/`modifyIndex` only ever increase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailboxRecord {
    pub id: UniqueIdent,
    pub user: UniqueIdent,
    pub path: String,
    pub special_use: SpecialUse,
    pub subscribed: bool,
    pub uid_validity: ImapUidvalidity,
    pub uid_next: ImapUid,
    pub modify_index: ModSeq,
    /// Milliseconds; 0 = disabled.
    pub retention: u64,
}

impl MailboxRecord {
    pub fn new(id: UniqueIdent, user: UniqueIdent, path: impl Into<String>, special_use: SpecialUse) -> Self {
        Self {
            id,
            user,
            path: path.into(),
            special_use,
            subscribed: matches!(special_use, SpecialUse::Inbox),
            uid_validity: NonZeroU32::new(1).unwrap(),
            uid_next: NonZeroU32::new(1).unwrap(),
            modify_index: NonZeroU64::new(1).unwrap(),
            retention: 0,
        }
    }

    /// Compute `(exp, rdate)` for a message landing in this mailbox, given
    /// its internal date. `exp` mirrors whether retention is enabled here;
    /// the sweep that actually expunges at `rdate` is out of scope — no
    /// sweeper is defined anywhere in this crate.
    pub fn compute_retention(&self, idate_ms: u64) -> (bool, Option<u64>) {
        if self.retention == 0 {
            (false, None)
        } else {
            (true, Some(idate_ms + self.retention))
        }
    }
}
