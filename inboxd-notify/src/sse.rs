use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use inboxd_collections::db::Db;
use inboxd_collections::model::mailbox::ImapUid;
use inboxd_collections::model::JournalCommand;
use inboxd_store::UniqueIdent;

use crate::journal::Notify;

const IDLE_COMMENT_INTERVAL: Duration = Duration::from_secs(15);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Serialize)]
struct EntryPayload {
    command: JournalCommand,
    mailbox: UniqueIdent,
    uid: Option<ImapUid>,
    message: Option<UniqueIdent>,
}

#[derive(Serialize)]
struct CountersPayload {
    command: &'static str,
    mailbox: UniqueIdent,
    unseen: u64,
}

/// Render every entry with `_id > last_event_id` as SSE `id:`/`data:`
/// frames, followed by one synthetic `COUNTERS` event per mailbox dirtied
/// by `EXISTS`/`EXPUNGE`/an unseen-changing `FETCH`. The
/// wire payload omits `_id`, `ignore`, `user`, `modseq` (they're framing or
/// origin-suppression metadata, not client-facing) and drops `unseen`
/// outside of a `COUNTERS` event. `listener_session`, when present, is
/// withheld from redelivery to itself via `JournalEntry.ignore`.
pub async fn render_drain(
    db: &Db,
    notify: &Notify,
    user: UniqueIdent,
    last_event_id: u64,
    listener_session: Option<&str>,
) -> (String, u64) {
    let entries = notify.entries_after(user, last_event_id, listener_session).await;
    let mut body = String::new();
    let mut dirty_mailboxes: HashMap<UniqueIdent, ()> = HashMap::new();
    let mut max_id = last_event_id;

    for entry in &entries {
        max_id = max_id.max(entry.id);
        let payload = EntryPayload {
            command: entry.command,
            mailbox: entry.mailbox,
            uid: entry.uid,
            message: entry.message,
        };
        let json = serde_json::to_string(&payload).expect("entry payload always serializes");
        body.push_str(&format!("id: {}\ndata: {}\n\n", entry.id, json));

        let dirties_counter = matches!(entry.command, JournalCommand::Exists | JournalCommand::Expunge)
            || (entry.command == JournalCommand::Fetch && entry.unseen.is_some());
        if dirties_counter {
            dirty_mailboxes.insert(entry.mailbox, ());
        }
    }

    for mailbox in dirty_mailboxes.into_keys() {
        let unseen = count_unseen(db, mailbox).await;
        let payload = CountersPayload {
            command: "COUNTERS",
            mailbox,
            unseen,
        };
        let json = serde_json::to_string(&payload).expect("counters payload always serializes");
        body.push_str(&format!("data: {}\n\n", json));
    }

    (body, max_id)
}

async fn count_unseen(db: &Db, mailbox: UniqueIdent) -> u64 {
    let mut count = 0u64;
    for (_, message_id) in db.uids_in_range(mailbox, 1, u32::MAX).await {
        if let Some(doc) = db.messages.get(&message_id).await {
            if doc.get().await.unseen {
                count += 1;
            }
        }
    }
    count
}

fn parse_last_event_id(req: &Request<Incoming>) -> u64 {
    if let Some(v) = req.headers().get("last-event-id").and_then(|v| v.to_str().ok()) {
        if let Ok(id) = v.parse() {
            return id;
        }
    }
    req.uri()
        .query()
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("lastEventId=").and_then(|v| v.parse().ok())))
        .unwrap_or(0)
}

/// The listening session's own id, so entries it originated (tagged via
/// `JournalEntry.ignore`) are not redelivered to it.
fn parse_session_id(req: &Request<Incoming>) -> Option<String> {
    if let Some(v) = req.headers().get("x-session-id").and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    req.uri()
        .query()
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("session=").map(|v| v.to_string())))
}

/// `GET /users/:user/updates`. Drains the journal on connect and again on
/// every poke or 15s tick; idles out after 30 minutes without a delivered
/// entry.
pub async fn serve(
    req: Request<Incoming>,
    user: UniqueIdent,
    db: Arc<Db>,
    notify: Arc<Notify>,
) -> Result<Response<BoxBody<Bytes, std::io::Error>>, http::Error> {
    let mut last_event_id = parse_last_event_id(&req);
    let session_id = parse_session_id(&req);
    let (tx, rx) = mpsc::channel::<Result<Frame<Bytes>, std::io::Error>>(16);

    tokio::spawn(async move {
        let mut poke = notify.subscribe(user, session_id.as_deref().unwrap_or("")).await;
        let mut idle_since_entry = tokio::time::Instant::now();

        let (initial, next_id) = render_drain(&db, &notify, user, last_event_id, session_id.as_deref()).await;
        last_event_id = next_id;
        if !initial.is_empty() && tx.send(Ok(Frame::data(Bytes::from(initial)))).await.is_err() {
            return;
        }

        let mut idling_ticks = 0u64;
        loop {
            if idle_since_entry.elapsed() >= IDLE_TIMEOUT {
                return;
            }
            match tokio::time::timeout(IDLE_COMMENT_INTERVAL, poke.changed()).await {
                Ok(Ok(())) => {
                    let (chunk, next_id) = render_drain(&db, &notify, user, last_event_id, session_id.as_deref()).await;
                    if next_id > last_event_id {
                        last_event_id = next_id;
                        idle_since_entry = tokio::time::Instant::now();
                        idling_ticks = 0;
                    }
                    if !chunk.is_empty() && tx.send(Ok(Frame::data(Bytes::from(chunk)))).await.is_err() {
                        return;
                    }
                }
                Ok(Err(_)) => return,
                Err(_) => {
                    idling_ticks += 1;
                    let comment = format!(": idling {}\n\n", idling_ticks);
                    if tx.send(Ok(Frame::data(Bytes::from(comment)))).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .body(StreamBody::new(ReceiverStream::new(rx)).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inboxd_collections::model::JournalEntry;
    use inboxd_store::gen_ident;

    fn entry(user: UniqueIdent, mailbox: UniqueIdent, command: JournalCommand, unseen: Option<bool>) -> JournalEntry {
        JournalEntry {
            id: 0,
            user,
            mailbox,
            command,
            uid: Some(ImapUid::new(1).unwrap()),
            message: Some(gen_ident()),
            modseq: None,
            unseen,
            ignore: None,
        }
    }

    #[tokio::test]
    async fn drain_emits_one_counters_event_per_dirtied_mailbox() {
        let db = Db::new();
        let notify = Notify::new();
        let user = gen_ident();
        let mailbox = gen_ident();

        notify.append(entry(user, mailbox, JournalCommand::Exists, None)).await;
        notify.append(entry(user, mailbox, JournalCommand::Exists, None)).await;

        let (body, max_id) = render_drain(&db, &notify, user, 0, None).await;
        assert_eq!(max_id, 2);
        assert_eq!(body.matches("\"command\":\"COUNTERS\"").count(), 1);
        assert_eq!(body.matches("id: ").count(), 2);
    }

    #[tokio::test]
    async fn resuming_skips_already_seen_entries() {
        let db = Db::new();
        let notify = Notify::new();
        let user = gen_ident();
        let mailbox = gen_ident();

        notify.append(entry(user, mailbox, JournalCommand::Exists, None)).await;
        let (_, after_first) = render_drain(&db, &notify, user, 0, None).await;
        notify.append(entry(user, mailbox, JournalCommand::Exists, None)).await;

        let (body, max_id) = render_drain(&db, &notify, user, after_first, None).await;
        assert_eq!(max_id, 2);
        assert_eq!(body.matches("id: ").count(), 1);
    }

    #[tokio::test]
    async fn a_listener_never_sees_its_own_origin_tagged_entry() {
        let db = Db::new();
        let notify = Notify::new();
        let user = gen_ident();
        let mailbox = gen_ident();

        let mut own = entry(user, mailbox, JournalCommand::Exists, None);
        own.ignore = Some("sess-self".to_string());
        notify.append(own).await;
        notify.append(entry(user, mailbox, JournalCommand::Exists, None)).await;

        let (body, max_id) = render_drain(&db, &notify, user, 0, Some("sess-self")).await;
        assert_eq!(max_id, 2);
        assert_eq!(body.matches("id: ").count(), 1);
        assert!(body.contains("id: 2"));
    }

    #[test]
    fn idle_comment_and_timeout_constants_match_the_documented_cadence() {
        assert_eq!(IDLE_COMMENT_INTERVAL, Duration::from_secs(15));
        assert_eq!(IDLE_TIMEOUT, Duration::from_secs(30 * 60));
    }
}
