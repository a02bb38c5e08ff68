use std::num::NonZeroU32;

use inboxd_store::{blob::AttachmentKey, gen_ident, AtomicDoc, UniqueIdent};

use crate::db::Db;
use crate::error::{HandlerError, MailboxError};
use crate::mail::duplicate::{find_duplicate, DuplicateMatch};
use crate::mail::flags::{apply_flag_updates, FlagUpdates};
use crate::mail::registry::{bump, reserve_slot};
use crate::mail::sink::{NotifySink, SessionSink};
use crate::mail::thread_resolver::{compute_reference_set, resolve_thread};
use crate::model::mailbox::{ImapUid, ImapUidvalidity, MailboxRecord, ModSeq};
use crate::model::message::{
    derive_intro, normalize_subject, normalize_text, project_indexed_headers, truncate_html_cumulative, Flag,
};
use crate::model::mime::ParsedMessage;
use crate::model::user::User;
use crate::model::{JournalCommand, JournalEntry, Message};

pub const BULK_BATCH_SIZE: usize = 150;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddStatus {
    New,
    Update,
    Skip,
}

pub struct AddRequest<'a> {
    pub parsed: ParsedMessage,
    pub mailbox: UniqueIdent,
    pub user: UniqueIdent,
    pub flags: Vec<Flag>,
    pub skip_existing: bool,
    pub session: Option<&'a dyn SessionSink>,
    pub idate: u64,
}

pub struct AddResult {
    pub uid_validity: ImapUidvalidity,
    pub uid: ImapUid,
    pub id: UniqueIdent,
    pub mailbox: UniqueIdent,
    pub status: AddStatus,
}

/// Add a message to a mailbox, deduplicating against any prior message with
/// the same `(hdate, msgid)`. On any failure after the quota bump, the
/// compensation stack unwinds in reverse: quota first, then orphaned
/// attachment bodies. The reserved UID itself is never rolled back — IMAP
/// permits UID gaps.
pub async fn add(db: &Db, sink: &dyn NotifySink, req: AddRequest<'_>) -> Result<AddResult, HandlerError> {
    let AddRequest {
        parsed,
        mailbox,
        user,
        flags: extra_flags,
        skip_existing,
        session,
        idate,
    } = req;

    let hdate = parsed
        .hdate
        .map(|d| d.timestamp_millis().max(0) as u64)
        .unwrap_or(idate);
    let msgid = parsed
        .msgid
        .clone()
        .unwrap_or_else(|| format!("<{}@inboxd>", uuid::Uuid::new_v4()));
    let subject = parsed.subject.clone().unwrap_or_default();
    let normalized_subject = normalize_subject(&subject);

    let mbox_doc = db.mailbox_doc(mailbox).await.ok_or(MailboxError::Missing)?;
    let mbox_snapshot = mbox_doc.get().await;

    if let Some(dup) = find_duplicate(db, mailbox, hdate, &msgid, mbox_snapshot.uid_next).await {
        if skip_existing {
            return Ok(AddResult {
                uid_validity: mbox_snapshot.uid_validity,
                uid: dup.old_uid,
                id: dup.message,
                mailbox,
                status: AddStatus::Skip,
            });
        }
        return replace_in_place(db, sink, &mbox_snapshot, dup, &extra_flags, session, idate).await;
    }

    let attachment_keys: Vec<AttachmentKey> = parsed
        .attachments
        .iter()
        .map(|a| AttachmentKey {
            hash: a.hash.clone(),
            magic: parsed.magic.clone(),
        })
        .collect();
    for (input, key) in parsed.attachments.iter().zip(attachment_keys.iter()) {
        db.attachments.create(key.clone(), input.data.clone()).await;
    }

    let user_doc = db
        .users
        .get(&user)
        .await
        .ok_or(HandlerError::Store(inboxd_store::StoreError::NotFound))?;
    bump_quota(&user_doc, parsed.size as i64).await;

    let slot = match reserve_slot(db, mailbox).await {
        Ok(slot) => slot,
        Err(e) => {
            bump_quota(&user_doc, -(parsed.size as i64)).await;
            db.attachments.delete_many(&attachment_keys).await;
            return Err(e.into());
        }
    };

    let refs = compute_reference_set(&parsed);
    let thread = resolve_thread(db, user, &normalized_subject, &refs, idate).await;

    let id = gen_ident();
    let mut message_flags = extra_flags;
    if !message_flags.contains(&Flag::Recent) {
        message_flags.push(Flag::Recent);
    }
    let (exp, rdate) = mbox_snapshot.compute_retention(idate);
    let mut message = Message {
        id,
        root: id,
        mailbox,
        user,
        uid: slot.uid,
        modseq: slot.modseq,
        thread,
        flags: message_flags,
        unseen: true,
        flagged: false,
        undeleted: true,
        draft: false,
        size: parsed.size,
        idate,
        hdate,
        msgid: msgid.clone(),
        envelope: parsed.envelope.clone(),
        bodystructure: parsed.bodystructure.clone(),
        mime_tree: parsed.mime_tree.clone(),
        headers: project_indexed_headers(&parsed.raw_headers, &[]),
        intro: derive_intro(&normalize_text(&parsed.text)),
        text: normalize_text(&parsed.text),
        html: truncate_html_cumulative(&parsed.html),
        magic: parsed.magic.clone(),
        searchable_by_mailbox: !mbox_snapshot.special_use.excluded_from_search_by_default(),
        searchable: true,
        junk: mbox_snapshot.special_use.is_junk(),
        exp,
        rdate,
    };
    message.recompute_derived_flags();

    if let Err(e) = db.messages.insert(id, message.clone()).await {
        bump_quota(&user_doc, -(parsed.size as i64)).await;
        db.attachments.delete_many(&attachment_keys).await;
        return Err(HandlerError::Store(e));
    }
    db.uid_insert(mailbox, slot.uid.get(), id).await;
    db.dup_index_insert(mailbox, hdate, msgid, id).await;

    if let Some(s) = session {
        if s.selected_mailbox() == Some(mailbox) {
            s.notify_exists(slot.uid);
        }
    }

    sink.append(JournalEntry {
        id: 0,
        user,
        mailbox,
        command: JournalCommand::Exists,
        uid: Some(slot.uid),
        message: Some(id),
        modseq: Some(slot.modseq),
        unseen: Some(message.unseen),
        ignore: session.map(|s| s.id().to_string()),
    })
    .await;
    sink.fire(user, &mbox_snapshot.path).await;

    Ok(AddResult {
        uid_validity: mbox_snapshot.uid_validity,
        uid: slot.uid,
        id,
        mailbox,
        status: AddStatus::New,
    })
}

async fn bump_quota(user_doc: &AtomicDoc<User>, delta: i64) {
    user_doc
        .update_and_return(|u| {
            let mut next = u.clone();
            next.storage_used += delta;
            Ok::<_, std::convert::Infallible>(next)
        })
        .await
        .expect("quota bump is infallible");
}

/// Reserve a new slot, update the existing document in place, keep
/// `_id`/`root`/body untouched, emit `EXPUNGE(old)` then `EXISTS(new)`.
async fn replace_in_place(
    db: &Db,
    sink: &dyn NotifySink,
    mbox_snapshot: &MailboxRecord,
    dup: DuplicateMatch,
    flags: &[Flag],
    session: Option<&dyn SessionSink>,
    idate: u64,
) -> Result<AddResult, HandlerError> {
    let slot = reserve_slot(db, mbox_snapshot.id).await?;
    let old_uid = dup.old_uid;

    let doc = db
        .messages
        .get(&dup.message)
        .await
        .ok_or(HandlerError::Store(inboxd_store::StoreError::NotFound))?;
    let flags = flags.to_vec();
    let updated = doc
        .update_and_return(|m| {
            let mut next = m.clone();
            next.uid = slot.uid;
            next.modseq = slot.modseq;
            next.idate = idate;
            if !flags.is_empty() {
                next.flags = flags.clone();
            }
            next.recompute_derived_flags();
            Ok::<_, std::convert::Infallible>(next)
        })
        .await
        .expect("replace-in-place is infallible");

    db.uid_remove(mbox_snapshot.id, old_uid.get()).await;
    db.uid_insert(mbox_snapshot.id, slot.uid.get(), dup.message).await;
    db.dup_index_insert(mbox_snapshot.id, updated.hdate, updated.msgid.clone(), dup.message)
        .await;

    if let Some(s) = session {
        if s.selected_mailbox() == Some(mbox_snapshot.id) {
            s.notify_expunge(old_uid);
            s.notify_exists(slot.uid);
        }
    }

    let ignore = session.map(|s| s.id().to_string());
    sink.append(JournalEntry {
        id: 0,
        user: mbox_snapshot.user,
        mailbox: mbox_snapshot.id,
        command: JournalCommand::Expunge,
        uid: Some(old_uid),
        message: Some(dup.message),
        modseq: Some(slot.modseq),
        unseen: None,
        ignore: ignore.clone(),
    })
    .await;
    sink.append(JournalEntry {
        id: 0,
        user: mbox_snapshot.user,
        mailbox: mbox_snapshot.id,
        command: JournalCommand::Exists,
        uid: Some(slot.uid),
        message: Some(dup.message),
        modseq: Some(slot.modseq),
        unseen: Some(updated.unseen),
        ignore,
    })
    .await;
    sink.fire(mbox_snapshot.user, &mbox_snapshot.path).await;

    Ok(AddResult {
        uid_validity: mbox_snapshot.uid_validity,
        uid: slot.uid,
        id: dup.message,
        mailbox: mbox_snapshot.id,
        status: AddStatus::Update,
    })
}

pub struct DelRequest<'a> {
    pub message: UniqueIdent,
    pub mailbox: Option<UniqueIdent>,
    pub session: Option<&'a dyn SessionSink>,
}

/// Delete a message. A missing document is not an error — `del` is
/// idempotent.
pub async fn del(db: &Db, sink: &dyn NotifySink, req: DelRequest<'_>) -> Result<(), HandlerError> {
    let Some(doc) = db.messages.get(&req.message).await else {
        return Ok(());
    };
    let msg = doc.get().await;
    if let Some(expected) = req.mailbox {
        if msg.mailbox != expected {
            return Ok(());
        }
    }

    db.messages.remove(&req.message).await;
    db.uid_remove(msg.mailbox, msg.uid.get()).await;
    db.dup_index_remove(msg.mailbox, msg.hdate, &msg.msgid).await;

    if let Some(user_doc) = db.users.get(&msg.user).await {
        bump_quota(&user_doc, -(msg.size as i64)).await;
    }

    let keys: Vec<AttachmentKey> = msg
        .mime_tree
        .attachment_map
        .values()
        .map(|hash| AttachmentKey {
            hash: hash.clone(),
            magic: msg.magic.clone(),
        })
        .collect();
    db.attachments.delete_many(&keys).await;

    if let Some(s) = req.session {
        if s.selected_mailbox() == Some(msg.mailbox) {
            s.notify_expunge(msg.uid);
        }
    }

    sink.append(JournalEntry {
        id: 0,
        user: msg.user,
        mailbox: msg.mailbox,
        command: JournalCommand::Expunge,
        uid: Some(msg.uid),
        message: Some(msg.id),
        modseq: None,
        unseen: None,
        ignore: req.session.map(|s| s.id().to_string()),
    })
    .await;
    if let Some(mbox) = db.mailbox_doc(msg.mailbox).await {
        sink.fire(msg.user, &mbox.get().await.path).await;
    }
    Ok(())
}

pub struct MoveRequest<'a> {
    pub source: UniqueIdent,
    pub destination: UniqueIdent,
    pub uids: Vec<ImapUid>,
    pub updates: FlagUpdates,
    pub auto_seen: bool,
    pub session: Option<&'a dyn SessionSink>,
}

pub struct MoveResult {
    pub uid_validity: ImapUidvalidity,
    pub source_uid: Vec<ImapUid>,
    pub destination_uid: Vec<ImapUid>,
}

/// Move messages between mailboxes. Does not roll back completed
/// per-message steps on a later failure — already-moved UIDs stay moved.
pub async fn move_messages(db: &Db, sink: &dyn NotifySink, req: MoveRequest<'_>) -> Result<MoveResult, HandlerError> {
    let MoveRequest {
        source,
        destination,
        mut uids,
        updates,
        auto_seen,
        session,
    } = req;
    uids.sort();

    let dest_initial = db.mailbox_doc(destination).await.ok_or(MailboxError::Missing)?.get().await;
    let source_snapshot = bump(db, source).await?;

    let mut source_uids = Vec::new();
    let mut destination_uids = Vec::new();
    let mut batch: Vec<JournalEntry> = Vec::new();
    let mut touched_user = None;

    for uid in uids {
        let Some(msg_id) = db.uid_lookup(source, uid.get()).await else {
            continue;
        };
        let Some(doc) = db.messages.get(&msg_id).await else {
            continue;
        };
        let old = doc.get().await;

        let slot = reserve_slot(db, destination).await?;
        let dest_snapshot = &slot.mailbox;
        let (exp, rdate) = dest_snapshot.compute_retention(old.idate);

        let new_id = gen_ident();
        let mut new_msg = old.clone();
        new_msg.id = new_id;
        new_msg.root = old.root;
        new_msg.mailbox = destination;
        new_msg.uid = slot.uid;
        new_msg.modseq = slot.modseq;
        new_msg.searchable_by_mailbox = !dest_snapshot.special_use.excluded_from_search_by_default();
        new_msg.junk = dest_snapshot.special_use.is_junk();
        new_msg.exp = exp;
        new_msg.rdate = rdate;
        apply_flag_updates(&mut new_msg, &updates);
        if auto_seen {
            apply_flag_updates(
                &mut new_msg,
                &FlagUpdates {
                    seen: Some(true),
                    ..Default::default()
                },
            );
        }

        db.messages.insert(new_id, new_msg.clone()).await.map_err(HandlerError::Store)?;
        db.uid_insert(destination, slot.uid.get(), new_id).await;
        db.dup_index_insert(destination, new_msg.hdate, new_msg.msgid.clone(), new_id).await;

        db.messages.remove(&msg_id).await;
        db.uid_remove(source, uid.get()).await;
        db.dup_index_remove(source, old.hdate, &old.msgid).await;

        if let Some(s) = session {
            if s.selected_mailbox() == Some(source) {
                s.notify_expunge(uid);
            }
            if s.selected_mailbox() == Some(destination) {
                s.notify_exists(slot.uid);
            }
        }

        let ignore = session.map(|s| s.id().to_string());
        batch.push(JournalEntry {
            id: 0,
            user: old.user,
            mailbox: source,
            command: JournalCommand::Expunge,
            uid: Some(uid),
            message: Some(msg_id),
            modseq: None,
            unseen: None,
            ignore: ignore.clone(),
        });
        batch.push(JournalEntry {
            id: 0,
            user: old.user,
            mailbox: destination,
            command: JournalCommand::Exists,
            uid: Some(slot.uid),
            message: Some(new_id),
            modseq: Some(slot.modseq),
            unseen: Some(new_msg.unseen),
            ignore,
        });

        touched_user = Some(old.user);
        source_uids.push(uid);
        destination_uids.push(slot.uid);

        if batch.len() >= BULK_BATCH_SIZE * 2 {
            flush_move(sink, &mut batch, touched_user, &source_snapshot.path, &dest_initial.path).await;
        }
    }
    flush_move(sink, &mut batch, touched_user, &source_snapshot.path, &dest_initial.path).await;

    Ok(MoveResult {
        uid_validity: dest_initial.uid_validity,
        source_uid: source_uids,
        destination_uid: destination_uids,
    })
}

async fn flush_move(
    sink: &dyn NotifySink,
    batch: &mut Vec<JournalEntry>,
    user: Option<UniqueIdent>,
    source_path: &str,
    dest_path: &str,
) {
    if batch.is_empty() {
        return;
    }
    for entry in batch.drain(..) {
        sink.append(entry).await;
    }
    if let Some(user) = user {
        sink.fire(user, source_path).await;
        sink.fire(user, dest_path).await;
    }
}

pub struct CopyRequest<'a> {
    pub source: UniqueIdent,
    pub destination: UniqueIdent,
    pub uids: Vec<ImapUid>,
    pub session: Option<&'a dyn SessionSink>,
}

pub struct CopyResult {
    pub uid_validity: ImapUidvalidity,
    pub source_uid: Vec<ImapUid>,
    pub destination_uid: Vec<ImapUid>,
}

/// Copy messages into another mailbox, leaving the source untouched —
/// the IMAP COPY/UID COPY counterpart to `move_messages`, which additionally
/// expunges the source. Preserves source-UID-ascending pairing order, same
/// as `move`.
pub async fn copy_messages(db: &Db, sink: &dyn NotifySink, req: CopyRequest<'_>) -> Result<CopyResult, HandlerError> {
    let CopyRequest {
        source,
        destination,
        mut uids,
        session,
    } = req;
    uids.sort();

    let dest_initial = db.mailbox_doc(destination).await.ok_or(MailboxError::Missing)?.get().await;

    let mut source_uids = Vec::new();
    let mut destination_uids = Vec::new();
    let mut batch: Vec<JournalEntry> = Vec::new();
    let mut touched_user = None;

    for uid in uids {
        let Some(msg_id) = db.uid_lookup(source, uid.get()).await else {
            continue;
        };
        let Some(doc) = db.messages.get(&msg_id).await else {
            continue;
        };
        let old = doc.get().await;

        let slot = reserve_slot(db, destination).await?;
        let dest_snapshot = &slot.mailbox;
        let (exp, rdate) = dest_snapshot.compute_retention(old.idate);

        let new_id = gen_ident();
        let mut new_msg = old.clone();
        new_msg.id = new_id;
        new_msg.root = old.root;
        new_msg.mailbox = destination;
        new_msg.uid = slot.uid;
        new_msg.modseq = slot.modseq;
        new_msg.searchable_by_mailbox = !dest_snapshot.special_use.excluded_from_search_by_default();
        new_msg.junk = dest_snapshot.special_use.is_junk();
        new_msg.exp = exp;
        new_msg.rdate = rdate;
        new_msg.recompute_derived_flags();

        db.messages.insert(new_id, new_msg.clone()).await.map_err(HandlerError::Store)?;
        db.uid_insert(destination, slot.uid.get(), new_id).await;
        db.dup_index_insert(destination, new_msg.hdate, new_msg.msgid.clone(), new_id).await;

        if let Some(s) = session {
            if s.selected_mailbox() == Some(destination) {
                s.notify_exists(slot.uid);
            }
        }

        let ignore = session.map(|s| s.id().to_string());
        batch.push(JournalEntry {
            id: 0,
            user: old.user,
            mailbox: destination,
            command: JournalCommand::Exists,
            uid: Some(slot.uid),
            message: Some(new_id),
            modseq: Some(slot.modseq),
            unseen: Some(new_msg.unseen),
            ignore,
        });

        touched_user = Some(old.user);
        source_uids.push(uid);
        destination_uids.push(slot.uid);

        if batch.len() >= BULK_BATCH_SIZE {
            flush_copy(sink, &mut batch, touched_user, &dest_initial.path).await;
        }
    }
    flush_copy(sink, &mut batch, touched_user, &dest_initial.path).await;

    Ok(CopyResult {
        uid_validity: dest_initial.uid_validity,
        source_uid: source_uids,
        destination_uid: destination_uids,
    })
}

async fn flush_copy(sink: &dyn NotifySink, batch: &mut Vec<JournalEntry>, user: Option<UniqueIdent>, dest_path: &str) {
    if batch.is_empty() {
        return;
    }
    for entry in batch.drain(..) {
        sink.append(entry).await;
    }
    if let Some(user) = user {
        sink.fire(user, dest_path).await;
    }
}

pub struct UpdateRequest {
    pub mailbox: UniqueIdent,
    pub uid_lo: ImapUid,
    pub uid_hi: ImapUid,
    pub updates: FlagUpdates,
}

pub struct UpdateResult {
    pub uid_validity: ImapUidvalidity,
    pub modseq: ModSeq,
    pub updated: Vec<ImapUid>,
}

/// Flag-update a UID range. `bump(mailbox)` once; every matched message is
/// stamped with that single post-image `modifyIndex`.
pub async fn update(db: &Db, sink: &dyn NotifySink, req: UpdateRequest) -> Result<UpdateResult, HandlerError> {
    if req.updates.is_empty() {
        return Err(HandlerError::NothingChanged);
    }

    let mbox_record = bump(db, req.mailbox).await?;
    let range = db.uids_in_range(req.mailbox, req.uid_lo.get(), req.uid_hi.get()).await;

    let mut updated_uids = Vec::new();
    let mut batch: Vec<JournalEntry> = Vec::new();
    let mut touched_user = None;

    for (uid, msg_id) in range {
        let Some(doc) = db.messages.get(&msg_id).await else {
            continue;
        };
        let updates = req.updates.clone();
        let target_modseq = mbox_record.modify_index;
        let updated_msg = doc
            .update_and_return(move |m| {
                let mut next = m.clone();
                apply_flag_updates(&mut next, &updates);
                next.modseq = target_modseq;
                Ok::<_, std::convert::Infallible>(next)
            })
            .await
            .expect("flag update is infallible");

        touched_user = Some(updated_msg.user);
        let uid = NonZeroU32::new(uid).expect("stored UIDs are non-zero");
        updated_uids.push(uid);
        batch.push(JournalEntry {
            id: 0,
            user: updated_msg.user,
            mailbox: req.mailbox,
            command: JournalCommand::Fetch,
            uid: Some(uid),
            message: Some(msg_id),
            modseq: Some(mbox_record.modify_index),
            unseen: Some(updated_msg.unseen),
            ignore: None,
        });

        if batch.len() >= BULK_BATCH_SIZE {
            flush_update(sink, &mut batch, touched_user, &mbox_record.path).await;
        }
    }
    flush_update(sink, &mut batch, touched_user, &mbox_record.path).await;

    Ok(UpdateResult {
        uid_validity: mbox_record.uid_validity,
        modseq: mbox_record.modify_index,
        updated: updated_uids,
    })
}

async fn flush_update(sink: &dyn NotifySink, batch: &mut Vec<JournalEntry>, user: Option<UniqueIdent>, path: &str) {
    if batch.is_empty() {
        return;
    }
    for entry in batch.drain(..) {
        sink.append(entry).await;
    }
    if let Some(user) = user {
        sink.fire(user, path).await;
    }
}
