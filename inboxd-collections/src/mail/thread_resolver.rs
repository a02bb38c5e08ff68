use base64::Engine;
use sha1::{Digest, Sha1};

use inboxd_store::{gen_ident, UniqueIdent};

use crate::db::Db;
use crate::model::{message::normalize_subject, mime::ParsedMessage, Thread};

const MAX_REFS: usize = 10;
const THREAD_INDEX_PREFIX_CHARS: usize = 22;

/// One each of Message-Id, In-Reply-To, the first 22 chars of
/// Thread-Index, and the last entry of References; tokenized, angle
/// brackets stripped, SHA-1 hashed, base64-encoded without padding,
/// deduplicated, capped at 10.
pub fn compute_reference_set(parsed: &ParsedMessage) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(4);
    if let Some(id) = &parsed.msgid {
        candidates.push(id.clone());
    }
    if let Some(irt) = &parsed.in_reply_to {
        candidates.push(irt.clone());
    }
    if let Some(ti) = &parsed.thread_index {
        let cut = ti
            .char_indices()
            .nth(THREAD_INDEX_PREFIX_CHARS)
            .map(|(i, _)| i)
            .unwrap_or(ti.len());
        candidates.push(ti[..cut].to_string());
    }
    if let Some(last) = parsed.references.last() {
        candidates.push(last.clone());
    }

    let mut out = Vec::new();
    'candidates: for candidate in &candidates {
        for token in candidate.split_whitespace() {
            let stripped = token.trim_start_matches('<').trim_end_matches('>');
            if stripped.is_empty() {
                continue;
            }
            let hash = hash_reference(stripped);
            if !out.contains(&hash) {
                out.push(hash);
            }
            if out.len() >= MAX_REFS {
                break 'candidates;
            }
        }
    }
    out
}

fn hash_reference(s: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    base64::engine::general_purpose::STANDARD
        .encode(digest)
        .trim_end_matches('=')
        .to_string()
}

/// Upsert the `threads` document keyed by `(user, subject-normalized, ids
/// intersecting refs)`: extend an existing thread's reference set if one
/// matches, otherwise insert a fresh thread. Returns the thread id to stamp
/// onto the message.
pub async fn resolve_thread(db: &Db, user: UniqueIdent, subject: &str, refs: &[String], updated: u64) -> UniqueIdent {
    let normalized_subject = normalize_subject(subject);

    let mut candidate_threads: Vec<UniqueIdent> = Vec::new();
    for r in refs {
        for tid in db.thread_by_ref_lookup(user, r).await {
            if !candidate_threads.contains(&tid) {
                candidate_threads.push(tid);
            }
        }
    }

    for tid in candidate_threads {
        let Some(doc) = db.threads.get(&tid).await else {
            continue;
        };
        if doc.get().await.subject != normalized_subject {
            continue;
        }
        doc.update_and_return(|t| {
            let mut next = t.clone();
            for r in refs {
                if !next.ids.contains(r) {
                    next.ids.push(r.clone());
                }
            }
            next.updated = next.updated.max(updated);
            Ok::<Thread, std::convert::Infallible>(next)
        })
        .await
        .expect("thread merge is infallible");
        for r in refs {
            db.thread_by_ref_insert(user, r.clone(), tid).await;
        }
        return tid;
    }

    let id = gen_ident();
    let thread = Thread {
        id,
        user,
        subject: normalized_subject,
        ids: refs.to_vec(),
        updated,
    };
    db.threads.insert(id, thread).await.expect("fresh thread id");
    for r in refs {
        db.thread_by_ref_insert(user, r.clone(), id).await;
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mime::MimeTree;

    fn parsed(subject: &str, in_reply_to: Option<&str>, references: Vec<&str>) -> ParsedMessage {
        ParsedMessage {
            size: 0,
            raw_headers: Vec::new(),
            bodystructure: String::new(),
            envelope: String::new(),
            mime_tree: MimeTree::default(),
            text: String::new(),
            html: Vec::new(),
            attachments: Vec::new(),
            magic: "m".to_string(),
            hdate: None,
            msgid: Some(format!("<{subject}-id@test>")),
            subject: Some(subject.to_string()),
            references: references.into_iter().map(String::from).collect(),
            in_reply_to: in_reply_to.map(String::from),
            thread_index: None,
        }
    }

    #[test]
    fn reference_set_is_deduplicated_and_capped() {
        let mut p = parsed("hello", Some("<a>"), vec!["<a>", "<a>"]);
        p.msgid = Some("<a>".to_string());
        let refs = compute_reference_set(&p);
        assert_eq!(refs.len(), 1);
    }

    #[tokio::test]
    async fn s6_two_messages_sharing_a_reference_and_subject_share_a_thread() {
        let db = Db::new();
        let user = gen_ident();

        let first = parsed("hello", None, vec!["<a>"]);
        let refs1 = compute_reference_set(&first);
        let tid1 = resolve_thread(&db, user, "hello", &refs1, 1).await;

        let second = parsed("Re: hello", None, vec!["<b>", "<a>"]);
        let refs2 = compute_reference_set(&second);
        let tid2 = resolve_thread(&db, user, "Re: hello", &refs2, 2).await;

        assert_eq!(tid1, tid2);
    }

    #[tokio::test]
    async fn unrelated_subjects_never_merge_even_with_shared_reference() {
        let db = Db::new();
        let user = gen_ident();

        let first = parsed("hello", None, vec!["<a>"]);
        let refs1 = compute_reference_set(&first);
        let tid1 = resolve_thread(&db, user, "hello", &refs1, 1).await;

        let second = parsed("totally different", None, vec!["<a>"]);
        let refs2 = compute_reference_set(&second);
        let tid2 = resolve_thread(&db, user, "totally different", &refs2, 2).await;

        assert_ne!(tid1, tid2);
    }
}
