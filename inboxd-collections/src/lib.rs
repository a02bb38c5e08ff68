//! Mail-store domain model and message-management core: mailboxes, messages,
//! threads, and the `add`/`del`/`move`/`update` algorithms that keep UID and
//! MODSEQ allocation correct under concurrent IMAP sessions.

pub mod db;
pub mod error;
pub mod mail;
pub mod model;

pub use db::Db;
