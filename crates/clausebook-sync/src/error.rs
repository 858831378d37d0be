use clausebook_ai::ExtractError;
use clausebook_core::ValidationError;
use clausebook_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The signed-in role lacks the named capability.
    #[error("permission denied: {0}")]
    Forbidden(&'static str),

    #[error("extraction produced no clauses")]
    NoClauses,

    #[error("legacy archive unavailable: {0}")]
    Archive(String),
}
