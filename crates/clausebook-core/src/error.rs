use thiserror::Error;

/// A backup or import payload that cannot be accepted.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid backup file: missing contract name")]
    MissingName,

    #[error("invalid backup file: missing clauses")]
    MissingClauses,

    #[error("invalid backup file: clauses must be a list")]
    ClausesNotAList,

    #[error("invalid backup file: contract has no clauses")]
    EmptyClauses,

    #[error("invalid backup file: {0}")]
    Json(#[from] serde_json::Error),
}
