//! The production `ImapHooks` implementation: backed directly by the
//! Message Handler (`copy_messages`) and the Mailbox Registry
//! (`delete_mailbox`/`set_subscribed`), the way SPEC_FULL.md's component
//! design section describes this trait being satisfied.

use std::num::NonZeroU32;
use std::sync::Arc;

use inboxd_collections::db::Db;
use inboxd_collections::error::{HandlerError, MailboxError};
use inboxd_collections::mail::sink::{NotifySink, SessionSink};
use inboxd_collections::mail::{copy_messages, delete_mailbox, set_subscribed, CopyRequest};
use inboxd_collections::model::{ImapUid, QuotaRoot};
use inboxd_store::UniqueIdent;

use crate::hooks::{AuthError, AuthOutcome, CopyError, CopyOutcome, ImapHooks, OpenOutcome};
use crate::password::verify_password;

/// A `SessionSink` that carries nothing but a session id, for call sites
/// that only need it to tag `JournalEntry.ignore` and have no live IMAP
/// session object (a hook is called from the wire layer, which this crate
/// never models concretely).
struct IdOnlySession<'a>(&'a str);

impl SessionSink for IdOnlySession<'_> {
    fn id(&self) -> &str {
        self.0
    }
    fn selected_mailbox(&self) -> Option<UniqueIdent> {
        None
    }
    fn notify_exists(&self, _uid: ImapUid) {}
    fn notify_expunge(&self, _uid: ImapUid) {}
}

pub struct CoreHooks {
    db: Arc<Db>,
    sink: Arc<dyn NotifySink>,
}

impl CoreHooks {
    pub fn new(db: Arc<Db>, sink: Arc<dyn NotifySink>) -> Self {
        Self { db, sink }
    }
}

#[async_trait::async_trait]
impl ImapHooks for CoreHooks {
    async fn on_auth(&self, _authzid: &str, authcid: &str, password: &str, _session: &str) -> Result<AuthOutcome, AuthError> {
        let id = self.db.find_user_by_username(authcid).await.ok_or(AuthError::AuthFailed)?;
        let doc = self.db.users.get(&id).await.ok_or(AuthError::AuthFailed)?;
        let user = doc.get().await;
        let hash = user.password_hash.as_deref().ok_or(AuthError::AuthFailed)?;
        match verify_password(password, hash) {
            Ok(true) => Ok(AuthOutcome { user: id }),
            _ => Err(AuthError::AuthFailed),
        }
    }

    async fn on_open(&self, user: UniqueIdent, path: &str, _session: &str) -> Result<OpenOutcome, MailboxError> {
        let id = self.db.find_mailbox_by_path(user, path).await.ok_or(MailboxError::Missing)?;
        let mailbox = self.db.mailbox_doc(id).await.ok_or(MailboxError::Missing)?.get().await;
        let uids = self
            .db
            .uids_in_range(id, 1, u32::MAX)
            .await
            .into_iter()
            .map(|(uid, _)| NonZeroU32::new(uid).expect("uids are always >=1"))
            .collect();
        Ok(OpenOutcome { mailbox, uids })
    }

    async fn on_copy(
        &self,
        user: UniqueIdent,
        source: &str,
        destination: &str,
        uids: Vec<ImapUid>,
        session: &str,
    ) -> Result<CopyOutcome, CopyError> {
        let source_id = self.db.find_mailbox_by_path(user, source).await.ok_or(CopyError::NonExistent)?;
        let dest_id = self.db.find_mailbox_by_path(user, destination).await.ok_or(CopyError::TryCreate)?;

        let id_session = IdOnlySession(session);
        let result = copy_messages(
            &self.db,
            self.sink.as_ref(),
            CopyRequest {
                source: source_id,
                destination: dest_id,
                uids,
                session: Some(&id_session),
            },
        )
        .await
        // both mailboxes were just confirmed to exist; the only remaining
        // failure mode in `copy_messages` is the destination-side
        // `reserve_slot`/insert path racing a concurrent delete.
        .map_err(|_: HandlerError| CopyError::TryCreate)?;

        Ok(CopyOutcome {
            uid_validity: result.uid_validity,
            uids: result.source_uid.into_iter().zip(result.destination_uid).collect(),
        })
    }

    async fn on_delete(&self, user: UniqueIdent, path: &str) -> Result<(), MailboxError> {
        let id = self.db.find_mailbox_by_path(user, path).await.ok_or(MailboxError::Missing)?;
        delete_mailbox(&self.db, id).await
    }

    async fn on_unsubscribe(&self, user: UniqueIdent, path: &str) -> Result<(), MailboxError> {
        let id = self.db.find_mailbox_by_path(user, path).await.ok_or(MailboxError::Missing)?;
        set_subscribed(&self.db, id, false).await.map(|_| ())
    }

    async fn on_get_quota_root(&self, user: UniqueIdent) -> Result<QuotaRoot, HandlerError> {
        let doc = self.db.users.get(&user).await.ok_or(MailboxError::NotFound)?;
        Ok(doc.get().await.quota_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inboxd_collections::mail::sink::NullSink;
    use inboxd_collections::mail::{create_mailbox, reserve_slot};
    use inboxd_collections::model::mailbox::SpecialUse;
    use inboxd_collections::model::{Flag, Message};
    use inboxd_collections::model::mime::MimeTree;
    use inboxd_store::gen_ident;

    async fn hooks_with_user(password: &str) -> (CoreHooks, UniqueIdent) {
        let db = Arc::new(Db::new());
        let id = gen_ident();
        let mut user = inboxd_collections::model::User::new(id, "alice", 0);
        user.password_hash = Some(crate::password::hash_password(password).unwrap());
        db.users.insert(id, user).await.unwrap();
        db.register_username("alice".to_string(), id).await;
        (CoreHooks::new(db, Arc::new(NullSink)), id)
    }

    #[tokio::test]
    async fn on_auth_accepts_the_right_password_and_rejects_a_wrong_one() {
        let (hooks, id) = hooks_with_user("hunter2").await;
        let ok = hooks.on_auth("", "alice", "hunter2", "sess-1").await.unwrap();
        assert_eq!(ok.user, id);
        assert!(matches!(hooks.on_auth("", "alice", "wrong", "sess-1").await, Err(AuthError::AuthFailed)));
    }

    #[tokio::test]
    async fn on_auth_rejects_an_unknown_username() {
        let (hooks, _) = hooks_with_user("hunter2").await;
        assert!(matches!(hooks.on_auth("", "bob", "hunter2", "sess-1").await, Err(AuthError::AuthFailed)));
    }

    fn blank_message(mailbox: UniqueIdent, user: UniqueIdent, uid: ImapUid) -> Message {
        Message {
            id: gen_ident(),
            root: gen_ident(),
            mailbox,
            user,
            uid,
            modseq: std::num::NonZeroU64::new(1).unwrap(),
            thread: gen_ident(),
            flags: vec![Flag::Seen],
            unseen: false,
            flagged: false,
            undeleted: true,
            draft: false,
            size: 10,
            idate: 0,
            hdate: 0,
            msgid: String::new(),
            envelope: String::new(),
            bodystructure: String::new(),
            mime_tree: MimeTree::default(),
            headers: Default::default(),
            intro: String::new(),
            text: String::new(),
            html: Vec::new(),
            magic: "m".to_string(),
            searchable_by_mailbox: true,
            searchable: true,
            junk: false,
            exp: false,
            rdate: None,
        }
    }

    #[tokio::test]
    async fn on_open_lists_every_uid_present_ascending() {
        let db = Arc::new(Db::new());
        let user = gen_ident();
        let mbox = create_mailbox(&db, user, "INBOX", SpecialUse::Inbox).await.unwrap();
        for _ in 0..3 {
            let slot = reserve_slot(&db, mbox.id).await.unwrap();
            let msg = blank_message(mbox.id, user, slot.uid);
            db.messages.insert(msg.id, msg.clone()).await.unwrap();
            db.uid_insert(mbox.id, slot.uid.get(), msg.id).await;
        }
        db.register_mailbox_path(user, mbox.path.clone(), mbox.id).await;

        let hooks = CoreHooks::new(db, Arc::new(NullSink));
        let outcome = hooks.on_open(user, "INBOX", "sess-1").await.unwrap();
        assert_eq!(outcome.uids.iter().map(|u| u.get()).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn on_open_reports_missing_for_an_unknown_path() {
        let db = Arc::new(Db::new());
        let hooks = CoreHooks::new(db, Arc::new(NullSink));
        assert!(matches!(hooks.on_open(gen_ident(), "Nope", "sess-1").await, Err(MailboxError::Missing)));
    }

    #[tokio::test]
    async fn on_delete_removes_the_mailbox_and_a_second_delete_reports_missing() {
        let db = Arc::new(Db::new());
        let user = gen_ident();
        let mbox = create_mailbox(&db, user, "Archive", SpecialUse::Archive).await.unwrap();
        let hooks = CoreHooks::new(db, Arc::new(NullSink));
        hooks.on_delete(user, "Archive").await.unwrap();
        assert!(matches!(hooks.on_delete(user, "Archive").await, Err(MailboxError::Missing)));
        let _ = mbox;
    }

    #[tokio::test]
    async fn on_unsubscribe_flips_the_flag() {
        let db = Arc::new(Db::new());
        let user = gen_ident();
        create_mailbox(&db, user, "INBOX", SpecialUse::Inbox).await.unwrap();
        let hooks = CoreHooks::new(db.clone(), Arc::new(NullSink));
        hooks.on_unsubscribe(user, "INBOX").await.unwrap();
        let id = db.find_mailbox_by_path(user, "INBOX").await.unwrap();
        assert!(!db.mailbox_doc(id).await.unwrap().get().await.subscribed);
    }

    #[tokio::test]
    async fn on_get_quota_root_reports_the_user_s_current_usage() {
        let db = Arc::new(Db::new());
        let id = gen_ident();
        let user = inboxd_collections::model::User::new(id, "alice", 1000);
        db.users.insert(id, user).await.unwrap();
        let hooks = CoreHooks::new(db, Arc::new(NullSink));
        let root = hooks.on_get_quota_root(id).await.unwrap();
        assert_eq!(root.quota, 1000);
    }

    #[tokio::test]
    async fn on_copy_reports_non_existent_for_a_missing_source() {
        let db = Arc::new(Db::new());
        let user = gen_ident();
        create_mailbox(&db, user, "Archive", SpecialUse::Archive).await.unwrap();
        let hooks = CoreHooks::new(db, Arc::new(NullSink));
        let result = hooks.on_copy(user, "Nope", "Archive", vec![], "sess-1").await;
        assert!(matches!(result, Err(CopyError::NonExistent)));
    }

    #[tokio::test]
    async fn on_copy_moves_messages_into_the_destination_preserving_order() {
        let db = Arc::new(Db::new());
        let user = gen_ident();
        let source = create_mailbox(&db, user, "INBOX", SpecialUse::Inbox).await.unwrap();
        let dest = create_mailbox(&db, user, "Archive", SpecialUse::Archive).await.unwrap();

        let mut copied_uids = Vec::new();
        for _ in 0..2 {
            let slot = reserve_slot(&db, source.id).await.unwrap();
            let msg = blank_message(source.id, user, slot.uid);
            db.messages.insert(msg.id, msg.clone()).await.unwrap();
            db.uid_insert(source.id, slot.uid.get(), msg.id).await;
            copied_uids.push(slot.uid);
        }

        let hooks = CoreHooks::new(db.clone(), Arc::new(NullSink));
        let outcome = hooks.on_copy(user, "INBOX", "Archive", copied_uids.clone(), "sess-1").await.unwrap();
        assert_eq!(outcome.uids.len(), 2);
        assert!(db.uid_lookup(source.id, copied_uids[0].get()).await.is_some());
        assert_eq!(outcome.uid_validity, dest.uid_validity);
    }
}
