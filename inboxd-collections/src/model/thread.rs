use serde::{Deserialize, Serialize};

use inboxd_store::UniqueIdent;

/// `(user, subject-normalized)` + reference-id set. One thread per
/// conversation; expanded by upsert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub id: UniqueIdent,
    pub user: UniqueIdent,
    pub subject: String,
    pub ids: Vec<String>,
    pub updated: u64,
}
