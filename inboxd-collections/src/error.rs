use thiserror::Error;

use inboxd_store::StoreError;

/// IMAP-facing outcome when a target mailbox is missing: the caller reports
/// this as `TRYCREATE`.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("mailbox does not exist")]
    Missing,
    #[error("mailbox not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota exceeded")]
    Exceeded,
}

/// Top-level error type for Message Handler operations.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("update request had no recognized change keys")]
    NothingChanged,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid message body")]
    InvalidMessage,
}
