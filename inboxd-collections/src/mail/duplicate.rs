use inboxd_store::UniqueIdent;

use crate::db::Db;
use crate::model::mailbox::ImapUid;

/// A prior message in the target mailbox with identical `(hdate, msgid)`
/// and a UID still below `uidNext`.
pub struct DuplicateMatch {
    pub message: UniqueIdent,
    pub old_uid: ImapUid,
}

pub async fn find_duplicate(
    db: &Db,
    mailbox: UniqueIdent,
    hdate: u64,
    msgid: &str,
    uid_next: ImapUid,
) -> Option<DuplicateMatch> {
    let candidate = db.dup_index_lookup(mailbox, hdate, msgid).await?;
    let doc = db.messages.get(&candidate).await?;
    let msg = doc.get().await;
    if msg.mailbox == mailbox && msg.hdate == hdate && msg.msgid == msgid && msg.uid.get() < uid_next.get() {
        Some(DuplicateMatch {
            message: candidate,
            old_uid: msg.uid,
        })
    } else {
        None
    }
}
