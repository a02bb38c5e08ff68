//! Re-exports the `NotifySink`/`SessionSink` contracts so callers can reach
//! them as `inboxd_notify::sink::*` as well as from `inboxd_collections`,
//! even though the traits themselves live in `inboxd-collections` (the
//! crate that owns `JournalEntry`) to avoid a dependency cycle between the
//! Message Handler and this crate's concrete `Notify`.

pub use inboxd_collections::mail::sink::{NotifySink, NullSink, SessionSink};
