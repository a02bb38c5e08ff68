use inboxd_store::{gen_ident, UniqueIdent};

use crate::db::Db;
use crate::error::MailboxError;
use crate::model::{ImapUid, MailboxRecord, ModSeq, SpecialUse};

/// Post-image of a `reserveSlot` call: the UID and MODSEQ handed to the
/// message that will occupy the slot, plus the mailbox's new tip.
pub struct SlotReservation {
    pub uid: ImapUid,
    pub modseq: ModSeq,
    pub mailbox: MailboxRecord,
}

/// Atomically increments both `uidNext` and `modifyIndex` by 1 and returns
/// the post-image. The assigned UID is the pre-increment `uidNext`; the
/// assigned MODSEQ is the post-increment `modifyIndex`, so `(modseq asc)`
/// is always a valid replay order.
///
/// Reservation and persistence of the occupying message must happen in the
/// same logical step the caller is already in: if message insert fails
/// after this call, the reserved UID is simply abandoned — gaps are
/// permitted, UIDs only need to be monotonic, not dense.
pub async fn reserve_slot(db: &Db, mailbox_id: UniqueIdent) -> Result<SlotReservation, MailboxError> {
    let doc = db.mailbox_doc(mailbox_id).await.ok_or(MailboxError::Missing)?;
    let post = doc
        .update_and_return(|m| {
            let mut next = m.clone();
            next.uid_next = ImapUid::new(m.uid_next.get() + 1).expect("uidNext overflow");
            next.modify_index = ModSeq::new(m.modify_index.get() + 1).expect("modifyIndex overflow");
            Ok::<_, MailboxError>(next)
        })
        .await?;

    let uid = ImapUid::new(post.uid_next.get() - 1).expect("uidNext started at >=1");
    Ok(SlotReservation {
        uid,
        modseq: post.modify_index,
        mailbox: post,
    })
}

/// Increments only `modifyIndex`, for operations that do not allocate a UID
/// (pure flag updates, the source side of a move).
pub async fn bump(db: &Db, mailbox_id: UniqueIdent) -> Result<MailboxRecord, MailboxError> {
    let doc = db.mailbox_doc(mailbox_id).await.ok_or(MailboxError::Missing)?;
    doc.update_and_return(|m| {
        let mut next = m.clone();
        next.modify_index = ModSeq::new(m.modify_index.get() + 1).expect("modifyIndex overflow");
        Ok::<_, MailboxError>(next)
    })
    .await
}

/// Create a new `(user, path)` mailbox record. Fails to register twice
/// under the same path (caller should check `find_mailbox_by_path` first;
/// this mirrors the `mailboxes(user, path)` unique index).
pub async fn create_mailbox(
    db: &Db,
    user: UniqueIdent,
    path: impl Into<String>,
    special_use: SpecialUse,
) -> Result<MailboxRecord, MailboxError> {
    let path = path.into();
    let id = gen_ident();
    let record = MailboxRecord::new(id, user, path.clone(), special_use);
    db.mailboxes
        .insert(id, record.clone())
        .await
        .map_err(|_| MailboxError::Missing)?;
    db.register_mailbox_path(user, path, id).await;
    Ok(record)
}

/// Remove a mailbox record and its path index entry. Messages it still
/// holds are left orphaned in `db.messages`/`uid_index` — callers that need
/// a non-empty-mailbox guard enforce it themselves before calling this.
pub async fn delete_mailbox(db: &Db, id: UniqueIdent) -> Result<(), MailboxError> {
    let doc = db.mailboxes.remove(&id).await.ok_or(MailboxError::Missing)?;
    let record = doc.get().await;
    db.unregister_mailbox_path(record.user, &record.path).await;
    Ok(())
}

/// Flip `subscribed` on a mailbox record.
pub async fn set_subscribed(db: &Db, id: UniqueIdent, subscribed: bool) -> Result<MailboxRecord, MailboxError> {
    let doc = db.mailbox_doc(id).await.ok_or(MailboxError::Missing)?;
    doc.update_and_return(|m| {
        let mut next = m.clone();
        next.subscribed = subscribed;
        Ok::<_, MailboxError>(next)
    })
    .await
}
