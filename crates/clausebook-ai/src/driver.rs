//! Batch extraction: split a source into chunks, call the extractor per chunk,
//! and accumulate clauses with progress reporting.
//!
//! Chunks run strictly one after another. The first failing call aborts the
//! whole batch and nothing accumulated so far is returned.

use clausebook_core::Clause;
use tracing::{info, warn};

use crate::extractor::{AnalysisInput, Extractor};
use crate::pages::{Document, PageSource};
use crate::ExtractError;

/// What the user handed in.
#[derive(Debug, Clone)]
pub enum SourceInput {
    Document(Document),
    DocumentPair { general: Document, particular: Document },
    TextPair { general: String, particular: String },
}

#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Pages taken from each side of a document pair per extractor call.
    pub pages_per_side: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { pages_per_side: 2 }
    }
}

/// A progress update. `percent` is in `0.0..=100.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: f32,
    pub stage: String,
}

impl Progress {
    fn fraction(done: usize, total: usize, stage: impl Into<String>) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            done as f32 / total as f32 * 100.0
        };
        Self {
            percent,
            stage: stage.into(),
        }
    }

    fn stage(percent: f32, stage: &str) -> Self {
        Self {
            percent,
            stage: stage.to_string(),
        }
    }
}

pub struct BatchDriver<'a> {
    extractor: &'a dyn Extractor,
    pages: &'a dyn PageSource,
    config: DriverConfig,
}

impl<'a> BatchDriver<'a> {
    pub fn new(extractor: &'a dyn Extractor, pages: &'a dyn PageSource) -> Self {
        Self {
            extractor,
            pages,
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the whole batch. Returns the raw accumulated clauses, unsorted.
    pub async fn run(
        &self,
        input: SourceInput,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<Vec<Clause>, ExtractError> {
        match input {
            SourceInput::Document(doc) => self.run_document(&doc, progress).await,
            SourceInput::DocumentPair {
                general,
                particular,
            } => self.run_pair(&general, &particular, progress).await,
            SourceInput::TextPair {
                general,
                particular,
            } => self.run_text_pair(general, particular, progress).await,
        }
    }

    async fn run_document(
        &self,
        doc: &Document,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<Vec<Clause>, ExtractError> {
        let pages = self.pages.extract_pages(doc).await?;
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(ExtractError::EmptyDocument(doc.name.clone()));
        }

        let total = pages.len();
        let mut clauses = Vec::new();
        for (i, page) in pages.into_iter().enumerate() {
            if !page.trim().is_empty() {
                let found = self
                    .call(AnalysisInput::Single(page), i + 1, total)
                    .await?;
                clauses.extend(found);
            }
            progress(Progress::fraction(
                i + 1,
                total,
                format!("Analyzed page {} of {total}", i + 1),
            ));
        }
        info!(document = %doc.name, pages = total, clauses = clauses.len(), "document extracted");
        Ok(clauses)
    }

    async fn run_pair(
        &self,
        general: &Document,
        particular: &Document,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<Vec<Clause>, ExtractError> {
        let general_pages = self.pages.extract_pages(general).await?;
        let particular_pages = self.pages.extract_pages(particular).await?;

        let chunks = pair_chunks(&general_pages, &particular_pages, self.config.pages_per_side);
        if chunks.is_empty() {
            return Err(ExtractError::EmptyDocument(format!(
                "{} / {}",
                general.name, particular.name
            )));
        }

        let total = chunks.len();
        let mut clauses = Vec::new();
        for (i, input) in chunks.into_iter().enumerate() {
            clauses.extend(self.call(input, i + 1, total).await?);
            progress(Progress::fraction(
                i + 1,
                total,
                format!("Compared section {} of {total}", i + 1),
            ));
        }
        info!(
            general = %general.name,
            particular = %particular.name,
            chunks = total,
            clauses = clauses.len(),
            "document pair extracted"
        );
        Ok(clauses)
    }

    async fn run_text_pair(
        &self,
        general: String,
        particular: String,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<Vec<Clause>, ExtractError> {
        if general.trim().is_empty() && particular.trim().is_empty() {
            return Err(ExtractError::EmptyDocument("pasted text".into()));
        }
        progress(Progress::stage(10.0, "Preparing text"));
        progress(Progress::stage(30.0, "Analyzing conditions"));
        let clauses = self
            .call(AnalysisInput::Dual { general, particular }, 1, 1)
            .await?;
        progress(Progress::stage(90.0, "Processing results"));
        progress(Progress::stage(100.0, "Complete"));
        Ok(clauses)
    }

    async fn call(
        &self,
        input: AnalysisInput,
        chunk: usize,
        total: usize,
    ) -> Result<Vec<Clause>, ExtractError> {
        self.extractor.analyze(&input).await.inspect_err(|e| {
            warn!(chunk, total, error = %e, "extraction failed, aborting batch");
        })
    }
}

/// Pair up to `per_side` pages from each document per chunk.
///
/// The longer document decides the chunk count; the shorter side contributes
/// empty text once it runs out.
pub fn pair_chunks(general: &[String], particular: &[String], per_side: usize) -> Vec<AnalysisInput> {
    let per_side = per_side.max(1);
    let total = general.len().div_ceil(per_side).max(particular.len().div_ceil(per_side));
    (0..total)
        .map(|i| AnalysisInput::Dual {
            general: join_window(general, i * per_side, per_side),
            particular: join_window(particular, i * per_side, per_side),
        })
        .collect()
}

fn join_window(pages: &[String], start: usize, len: usize) -> String {
    pages
        .iter()
        .skip(start)
        .take(len)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ScriptedExtractor;
    use crate::pages::TextLayer;

    fn clauses(numbers: &[&str]) -> Vec<Clause> {
        numbers.iter().map(|n| Clause::new(*n, "", "")).collect()
    }

    fn pages(text: &str) -> Document {
        Document::new("doc.txt", text.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn single_document_one_call_per_page() {
        let extractor = ScriptedExtractor::new(vec![
            Ok(clauses(&["1", "1.1"])),
            Ok(clauses(&["2"])),
            Ok(clauses(&["3"])),
        ]);
        let driver = BatchDriver::new(&extractor, &TextLayer);
        let mut seen = Vec::new();
        let out = driver
            .run(
                SourceInput::Document(pages("p1\x0Cp2\x0Cp3")),
                &mut |p| seen.push(p.percent),
            )
            .await
            .unwrap();

        assert_eq!(out.len(), 4);
        assert_eq!(extractor.seen().len(), 3);
        assert_eq!(extractor.seen()[1], AnalysisInput::Single("p2".into()));
        assert_eq!(seen.len(), 3);
        assert!((seen[0] - 100.0 / 3.0).abs() < 0.01);
        assert_eq!(seen[2], 100.0);
    }

    #[tokio::test]
    async fn blank_pages_skipped_but_counted() {
        let extractor = ScriptedExtractor::new(vec![Ok(clauses(&["1"])), Ok(clauses(&["2"]))]);
        let driver = BatchDriver::new(&extractor, &TextLayer);
        let mut seen = Vec::new();
        driver
            .run(
                SourceInput::Document(pages("p1\x0C  \x0Cp3")),
                &mut |p| seen.push(p.percent),
            )
            .await
            .unwrap();
        assert_eq!(extractor.seen().len(), 2);
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn failure_aborts_remaining_chunks() {
        let extractor = ScriptedExtractor::new(vec![
            Ok(clauses(&["1"])),
            Err("rate limit exceeded".into()),
            Ok(clauses(&["3"])),
        ]);
        let driver = BatchDriver::new(&extractor, &TextLayer);
        let err = driver
            .run(SourceInput::Document(pages("p1\x0Cp2\x0Cp3")), &mut |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rate limit exceeded");
        assert_eq!(extractor.seen().len(), 2);
    }

    #[tokio::test]
    async fn empty_document_rejected() {
        let extractor = ScriptedExtractor::default();
        let driver = BatchDriver::new(&extractor, &TextLayer);
        let err = driver
            .run(SourceInput::Document(pages(" \x0C ")), &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument(_)));
        assert!(extractor.seen().is_empty());
    }

    #[tokio::test]
    async fn document_pair_chunks_two_pages_per_side() {
        let extractor = ScriptedExtractor::new(vec![
            Ok(clauses(&["1"])),
            Ok(clauses(&["2"])),
            Ok(clauses(&["3"])),
        ]);
        let driver = BatchDriver::new(&extractor, &TextLayer);
        let mut seen = Vec::new();
        let out = driver
            .run(
                SourceInput::DocumentPair {
                    general: pages("g1\x0Cg2\x0Cg3\x0Cg4\x0Cg5"),
                    particular: pages("q1\x0Cq2"),
                },
                &mut |p| seen.push(p.percent),
            )
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        let calls = extractor.seen();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            AnalysisInput::Dual {
                general: "g1\n\ng2".into(),
                particular: "q1\n\nq2".into()
            }
        );
        assert_eq!(
            calls[2],
            AnalysisInput::Dual {
                general: "g5".into(),
                particular: String::new()
            }
        );
        assert_eq!(seen.last().copied(), Some(100.0));
    }

    #[tokio::test]
    async fn text_pair_single_call_with_stages() {
        let extractor = ScriptedExtractor::new(vec![Ok(clauses(&["1", "2"]))]);
        let driver = BatchDriver::new(&extractor, &TextLayer);
        let mut stages = Vec::new();
        let out = driver
            .run(
                SourceInput::TextPair {
                    general: "general text".into(),
                    particular: "particular text".into(),
                },
                &mut |p| stages.push(p.percent),
            )
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(extractor.seen().len(), 1);
        assert_eq!(stages, vec![10.0, 30.0, 90.0, 100.0]);
    }

    #[test]
    fn pair_chunks_respects_config() {
        let g: Vec<String> = (1..=3).map(|i| format!("g{i}")).collect();
        let p: Vec<String> = (1..=3).map(|i| format!("p{i}")).collect();
        assert_eq!(pair_chunks(&g, &p, 1).len(), 3);
        assert_eq!(pair_chunks(&g, &p, 2).len(), 2);
        assert_eq!(pair_chunks(&g, &p, 0).len(), 3);
        assert!(pair_chunks(&[], &[], 2).is_empty());
    }
}
