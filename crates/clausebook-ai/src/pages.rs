//! Page-level text extraction.
//!
//! PDF text extraction is behind the `pdf` feature. Plain text documents
//! (for example `pdftotext` output) are split on form feeds.

use async_trait::async_trait;
use tracing::debug;

use crate::ExtractError;

const FORM_FEED: char = '\x0C';

/// A source document as uploaded.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn read(path: &std::path::Path) -> Result<Self, ExtractError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }

    pub fn is_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF") || self.name.to_ascii_lowercase().ends_with(".pdf")
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    /// One entry per page, in page order.
    async fn extract_pages(&self, document: &Document) -> Result<Vec<String>, ExtractError>;
}

/// Reads the document's own text layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLayer;

#[async_trait]
impl PageSource for TextLayer {
    async fn extract_pages(&self, document: &Document) -> Result<Vec<String>, ExtractError> {
        let text = if document.is_pdf() {
            extract_pdf(&document.bytes)?
        } else {
            String::from_utf8_lossy(&document.bytes).into_owned()
        };
        let pages = split_pages(&text);
        debug!(document = %document.name, pages = pages.len(), "extracted text layer");
        Ok(pages)
    }
}

/// Split on form feeds, dropping a trailing empty page.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(FORM_FEED).map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

#[cfg(feature = "pdf")]
fn extract_pdf(data: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(data).map_err(|e| ExtractError::Pdf(e.to_string()))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_data: &[u8]) -> Result<String, ExtractError> {
    Err(ExtractError::FeatureDisabled("pdf"))
}
