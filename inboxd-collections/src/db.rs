use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use inboxd_store::{blob::AttachmentStore, counter::CounterService, AtomicDoc, Collection, UniqueIdent};

use crate::model::{MailboxRecord, Message, Thread, User};

/// The set of collections the message-management core reads and mutates:
/// `users`, `mailboxes`, `messages`, `threads`, plus the secondary indexes a
/// real database would cover with ordinary indexes (`messages(mailbox,
/// uid)` unique, `mailboxes(user, path)` unique, ...).
#[derive(Default)]
pub struct Db {
    pub users: Collection<UniqueIdent, User>,
    pub mailboxes: Collection<UniqueIdent, MailboxRecord>,
    pub messages: Collection<UniqueIdent, Message>,
    pub threads: Collection<UniqueIdent, Thread>,
    pub attachments: AttachmentStore,
    pub counters: CounterService,

    /// `mailboxes(user, path)` unique index.
    mailbox_by_path: RwLock<HashMap<(UniqueIdent, String), UniqueIdent>>,
    /// `users(unameview)` unique index.
    user_by_username: RwLock<HashMap<String, UniqueIdent>>,
    /// Per-mailbox `uid -> message id`, ascending by construction
    /// (`BTreeMap`), mirroring `messages(mailbox, uid)` unique.
    uid_index: RwLock<HashMap<UniqueIdent, BTreeMap<u32, UniqueIdent>>>,
    /// `threads(user, ids)` index: one entry per reference id, to the set
    /// of thread ids carrying it.
    thread_by_ref: RwLock<HashMap<(UniqueIdent, String), Vec<UniqueIdent>>>,
    /// `messages(mailbox, hdate, msgid)` index the duplicate probe needs.
    dup_index: RwLock<HashMap<(UniqueIdent, u64, String), UniqueIdent>>,
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_mailbox_path(&self, user: UniqueIdent, path: String, id: UniqueIdent) {
        self.mailbox_by_path.write().await.insert((user, path), id);
    }

    pub async fn find_mailbox_by_path(&self, user: UniqueIdent, path: &str) -> Option<UniqueIdent> {
        self.mailbox_by_path
            .read()
            .await
            .get(&(user, path.to_string()))
            .copied()
    }

    pub async fn unregister_mailbox_path(&self, user: UniqueIdent, path: &str) {
        self.mailbox_by_path.write().await.remove(&(user, path.to_string()));
    }

    pub async fn register_username(&self, unameview: String, id: UniqueIdent) {
        self.user_by_username.write().await.insert(unameview, id);
    }

    pub async fn find_user_by_username(&self, unameview: &str) -> Option<UniqueIdent> {
        self.user_by_username.read().await.get(unameview).copied()
    }

    pub async fn uid_insert(&self, mailbox: UniqueIdent, uid: u32, message: UniqueIdent) {
        self.uid_index
            .write()
            .await
            .entry(mailbox)
            .or_default()
            .insert(uid, message);
    }

    pub async fn uid_remove(&self, mailbox: UniqueIdent, uid: u32) {
        if let Some(map) = self.uid_index.write().await.get_mut(&mailbox) {
            map.remove(&uid);
        }
    }

    pub async fn uid_lookup(&self, mailbox: UniqueIdent, uid: u32) -> Option<UniqueIdent> {
        self.uid_index.read().await.get(&mailbox).and_then(|m| m.get(&uid).copied())
    }

    /// UIDs ascending in `[lo, hi]`, the iteration order `move`/`update`
    /// require.
    pub async fn uids_in_range(&self, mailbox: UniqueIdent, lo: u32, hi: u32) -> Vec<(u32, UniqueIdent)> {
        self.uid_index
            .read()
            .await
            .get(&mailbox)
            .map(|m| m.range(lo..=hi).map(|(u, id)| (*u, *id)).collect())
            .unwrap_or_default()
    }

    pub async fn thread_by_ref_lookup(&self, user: UniqueIdent, reference: &str) -> Vec<UniqueIdent> {
        self.thread_by_ref
            .read()
            .await
            .get(&(user, reference.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn thread_by_ref_insert(&self, user: UniqueIdent, reference: String, thread: UniqueIdent) {
        let mut map = self.thread_by_ref.write().await;
        let entry = map.entry((user, reference)).or_default();
        if !entry.contains(&thread) {
            entry.push(thread);
        }
    }

    pub async fn mailbox_doc(&self, id: UniqueIdent) -> Option<AtomicDoc<MailboxRecord>> {
        self.mailboxes.get(&id).await
    }

    pub async fn dup_index_insert(&self, mailbox: UniqueIdent, hdate: u64, msgid: String, message: UniqueIdent) {
        self.dup_index.write().await.insert((mailbox, hdate, msgid), message);
    }

    pub async fn dup_index_remove(&self, mailbox: UniqueIdent, hdate: u64, msgid: &str) {
        self.dup_index.write().await.remove(&(mailbox, hdate, msgid.to_string()));
    }

    pub async fn dup_index_lookup(&self, mailbox: UniqueIdent, hdate: u64, msgid: &str) -> Option<UniqueIdent> {
        self.dup_index
            .read()
            .await
            .get(&(mailbox, hdate, msgid.to_string()))
            .copied()
    }
}
