use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extraction collaborator rejected the request. The message is shown verbatim.
    #[error("{0}")]
    Failed(String),

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("feature not enabled: rebuild with --features {0}")]
    FeatureDisabled(&'static str),

    #[error("document has no text pages: {0}")]
    EmptyDocument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
