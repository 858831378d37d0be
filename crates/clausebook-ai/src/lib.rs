//! Extraction layer: page text extraction, the batch extraction driver, and
//! the language-model collaborator that turns contract text into clauses.

pub mod driver;
mod error;
pub mod extractor;
pub mod pages;
pub mod prompt;

pub use driver::{BatchDriver, DriverConfig, Progress, SourceInput};
pub use error::ExtractError;
pub use extractor::{AnalysisInput, Extractor, ScriptedExtractor};
pub use pages::{Document, PageSource, TextLayer};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{ExtractorConfig, LlmExtractor};
