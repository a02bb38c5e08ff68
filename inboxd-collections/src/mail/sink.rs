use async_trait::async_trait;

use inboxd_store::UniqueIdent;

use crate::model::journal::JournalEntry;
use crate::model::mailbox::ImapUid;

/// Breaks the MessageHandler <-> Notifier <-> Session cycle: the handler
/// depends on this trait, never on a concrete notifier, and the
/// `inboxd-notify` crate provides the implementation. `inboxd_notify::sink::
/// NotifySink` re-exports this type so callers can import it from either
/// crate.
#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Append a journal entry under `(user, mailbox path)` scope.
    async fn append(&self, entry: JournalEntry);
    /// Publish a lightweight poke so listeners re-read the journal.
    async fn fire(&self, user: UniqueIdent, mailbox_path: &str);
}

/// The live IMAP session that originated a call, if any: when its selected
/// mailbox matches the target, the handler writes the `EXISTS`/`EXPUNGE`
/// frame synchronously, ahead of the notifier.
pub trait SessionSink: Send + Sync {
    fn id(&self) -> &str;
    fn selected_mailbox(&self) -> Option<UniqueIdent>;
    fn notify_exists(&self, uid: ImapUid);
    fn notify_expunge(&self, uid: ImapUid);
}

/// No-op sink, for tests and standalone use of the collections crate.
pub struct NullSink;

#[async_trait]
impl NotifySink for NullSink {
    async fn append(&self, _entry: JournalEntry) {}
    async fn fire(&self, _user: UniqueIdent, _mailbox_path: &str) {}
}
