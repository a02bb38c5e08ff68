use serde::{Deserialize, Serialize};

use inboxd_store::UniqueIdent;

use super::mailbox::{ImapUid, ModSeq};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JournalCommand {
    Exists,
    Expunge,
    Fetch,
    Counters,
}

/// Append-only log entry keyed per user. Entries with the same `user` are
/// totally ordered by `id` (journal sequence).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: u64,
    pub user: UniqueIdent,
    pub mailbox: UniqueIdent,
    pub command: JournalCommand,
    pub uid: Option<ImapUid>,
    pub message: Option<UniqueIdent>,
    pub modseq: Option<ModSeq>,
    pub unseen: Option<bool>,
    /// Session id that should not have this entry redelivered to it
    /// (origin suppression).
    pub ignore: Option<String>,
}
