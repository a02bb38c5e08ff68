use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};

use inboxd_collections::mail::sink::NotifySink;
use inboxd_collections::model::JournalEntry;
use inboxd_store::UniqueIdent;

/// Per-user append-only journal plus a watch-channel poke, grounded on
/// `mail/incoming.rs`'s "poke, then the consumer re-reads state" idiom: the
/// watch value is just the latest assigned journal id, so a woken listener
/// always knows how far it can drain without a second round-trip.
struct UserJournal {
    entries: Vec<JournalEntry>,
    next_id: u64,
    poke: watch::Sender<u64>,
}

impl UserJournal {
    fn new() -> Self {
        let (poke, _) = watch::channel(0);
        Self {
            entries: Vec::new(),
            next_id: 1,
            poke,
        }
    }
}

/// Durable per-user journal store plus the cross-session poke bus.
/// Implements [`NotifySink`] so the Message Handler never depends on this
/// crate directly.
pub struct Notify {
    users: RwLock<HashMap<UniqueIdent, Arc<Mutex<UserJournal>>>>,
}

impl Notify {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    async fn journal_for(&self, user: UniqueIdent) -> Arc<Mutex<UserJournal>> {
        if let Some(j) = self.users.read().await.get(&user) {
            return j.clone();
        }
        let mut map = self.users.write().await;
        map.entry(user).or_insert_with(|| Arc::new(Mutex::new(UserJournal::new()))).clone()
    }

    /// `addListener`: a session subscribes to this user's poke channel.
    /// `removeListener` is simply dropping the returned receiver.
    ///
    /// `listener_session` identifies the subscribing session the same way
    /// it's threaded through `entries_after`/`render_drain`/`serve`, but the
    /// poke value carries no entry content to suppress — it is only ever
    /// "something changed, go re-read" — so there is nothing to filter here.
    /// It is accepted (and traced) so a caller can't skip origin suppression
    /// by subscribing without one; the actual filtering happens where the
    /// entries themselves are read, in `entries_after`.
    pub async fn subscribe(&self, user: UniqueIdent, listener_session: &str) -> watch::Receiver<u64> {
        tracing::trace!(session = listener_session, "subscribing to poke channel");
        self.journal_for(user).await.lock().await.poke.subscribe()
    }

    /// Entries with `_id > last_event_id`, in ascending journal order,
    /// withholding any entry whose `ignore` equals `listener_session` (origin
    /// suppression).
    pub async fn entries_after(&self, user: UniqueIdent, last_event_id: u64, listener_session: Option<&str>) -> Vec<JournalEntry> {
        let journal = self.journal_for(user).await;
        let guard = journal.lock().await;
        guard
            .entries
            .iter()
            .filter(|e| e.id > last_event_id)
            .filter(|e| !(listener_session.is_some() && e.ignore.as_deref() == listener_session))
            .cloned()
            .collect()
    }

    pub async fn latest_id(&self, user: UniqueIdent) -> u64 {
        let journal = self.journal_for(user).await;
        journal.lock().await.entries.last().map(|e| e.id).unwrap_or(0)
    }
}

impl Default for Notify {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotifySink for Notify {
    async fn append(&self, mut entry: JournalEntry) {
        let journal = self.journal_for(entry.user).await;
        let mut guard = journal.lock().await;
        entry.id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push(entry);
    }

    async fn fire(&self, user: UniqueIdent, _mailbox_path: &str) {
        let journal = self.journal_for(user).await;
        let guard = journal.lock().await;
        let latest = guard.entries.last().map(|e| e.id).unwrap_or(0);
        let _ = guard.poke.send(latest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inboxd_collections::model::{mailbox::ImapUid, JournalCommand};
    use inboxd_store::gen_ident;

    fn entry(user: UniqueIdent, mailbox: UniqueIdent, command: JournalCommand) -> JournalEntry {
        JournalEntry {
            id: 0,
            user,
            mailbox,
            command,
            uid: Some(ImapUid::new(1).unwrap()),
            message: Some(gen_ident()),
            modseq: None,
            unseen: None,
            ignore: None,
        }
    }

    #[tokio::test]
    async fn appended_entries_get_strictly_increasing_ids() {
        let notify = Notify::new();
        let user = gen_ident();
        let mailbox = gen_ident();
        notify.append(entry(user, mailbox, JournalCommand::Exists)).await;
        notify.append(entry(user, mailbox, JournalCommand::Exists)).await;
        let all = notify.entries_after(user, 0, None).await;
        assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn resuming_from_last_event_id_only_yields_later_entries() {
        let notify = Notify::new();
        let user = gen_ident();
        let mailbox = gen_ident();
        notify.append(entry(user, mailbox, JournalCommand::Exists)).await;
        notify.append(entry(user, mailbox, JournalCommand::Exists)).await;
        let resumed = notify.entries_after(user, 1, None).await;
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].id, 2);
    }

    #[tokio::test]
    async fn entries_after_withholds_entries_tagged_for_the_listening_session() {
        let notify = Notify::new();
        let user = gen_ident();
        let mailbox = gen_ident();

        let mut from_origin = entry(user, mailbox, JournalCommand::Exists);
        from_origin.ignore = Some("sess-a".to_string());
        notify.append(from_origin).await;
        notify.append(entry(user, mailbox, JournalCommand::Exists)).await;

        let for_origin = notify.entries_after(user, 0, Some("sess-a")).await;
        assert_eq!(for_origin.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2]);

        let for_other = notify.entries_after(user, 0, Some("sess-b")).await;
        assert_eq!(for_other.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);

        let for_unset = notify.entries_after(user, 0, None).await;
        assert_eq!(for_unset.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn fire_wakes_a_subscribed_listener() {
        let notify = Notify::new();
        let user = gen_ident();
        let mailbox = gen_ident();
        let mut rx = notify.subscribe(user, "sess-1").await;
        notify.append(entry(user, mailbox, JournalCommand::Exists)).await;
        notify.fire(user, "INBOX").await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
