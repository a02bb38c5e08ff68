use thiserror::Error;

/// Errors surfaced by the in-memory store. A real persistence backend would
/// wrap its own driver errors the same way; callers propagate this verbatim
/// (spec error taxonomy: `StoreError`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,
    #[error("internal store error: {0}")]
    Internal(String),
}
