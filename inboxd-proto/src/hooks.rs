//! The inbound IMAP command surface, modeled as one trait so a server
//! front-end can drive the message-management core without depending on its
//! concrete types.

use thiserror::Error;

use inboxd_collections::model::{ImapUid, ImapUidvalidity, MailboxRecord, QuotaRoot};
use inboxd_store::UniqueIdent;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed")]
    AuthFailed,
    #[error("invalid SASL argument")]
    AuthBadArgument,
    #[error("authentication mechanism not implemented")]
    AuthNotImplemented,
    #[error("plaintext authentication requires TLS")]
    AuthRequiresTls,
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("source mailbox does not exist")]
    NonExistent,
    #[error("destination mailbox does not exist")]
    TryCreate,
}

pub struct AuthOutcome {
    pub user: UniqueIdent,
}

pub struct OpenOutcome {
    pub mailbox: MailboxRecord,
    /// UIDs present at open time, ascending, for the initial `EXISTS`/UID
    /// listing.
    pub uids: Vec<ImapUid>,
}

pub struct CopyOutcome {
    pub uid_validity: ImapUidvalidity,
    /// `(sourceUid, destinationUid)` pairs, in the order the caller
    /// requested the copy.
    pub uids: Vec<(ImapUid, ImapUid)>,
}

/// The six inbound command hooks the message-management core exposes to an
/// IMAP front-end. A session never reaches into storage directly.
#[async_trait::async_trait]
pub trait ImapHooks: Send + Sync {
    async fn on_auth(&self, authzid: &str, authcid: &str, password: &str, session: &str) -> Result<AuthOutcome, AuthError>;

    async fn on_open(&self, user: UniqueIdent, path: &str, session: &str) -> Result<OpenOutcome, inboxd_collections::error::MailboxError>;

    async fn on_copy(
        &self,
        user: UniqueIdent,
        source: &str,
        destination: &str,
        uids: Vec<ImapUid>,
        session: &str,
    ) -> Result<CopyOutcome, CopyError>;

    async fn on_delete(&self, user: UniqueIdent, path: &str) -> Result<(), inboxd_collections::error::MailboxError>;

    async fn on_unsubscribe(&self, user: UniqueIdent, path: &str) -> Result<(), inboxd_collections::error::MailboxError>;

    async fn on_get_quota_root(&self, user: UniqueIdent) -> Result<QuotaRoot, inboxd_collections::error::HandlerError>;
}
