//! The extraction collaborator: text in, structured clauses out.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use clausebook_core::Clause;

use crate::ExtractError;

/// Text handed to the extraction collaborator in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    /// One document's text.
    Single(String),
    /// Matching slices of the baseline and project-specific documents.
    Dual { general: String, particular: String },
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract clauses from `input`. Failures carry a human-readable message.
    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Clause>, ExtractError>;
}

/// Replays a fixed sequence of responses and records every input it saw.
///
/// Useful for driving pipelines without a model.
#[derive(Default)]
pub struct ScriptedExtractor {
    responses: Mutex<VecDeque<Result<Vec<Clause>, String>>>,
    seen: Mutex<Vec<AnalysisInput>>,
}

impl ScriptedExtractor {
    pub fn new(responses: Vec<Result<Vec<Clause>, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Inputs received so far, in call order.
    pub fn seen(&self) -> Vec<AnalysisInput> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Clause>, ExtractError> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(input.clone());
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Ok(clauses)) => Ok(clauses),
            Some(Err(message)) => Err(ExtractError::Failed(message)),
            None => Err(ExtractError::Failed("no scripted response left".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order() {
        let extractor = ScriptedExtractor::new(vec![
            Ok(vec![Clause::new("1", "", "")]),
            Err("quota exceeded".into()),
        ]);
        let input = AnalysisInput::Single("page one".into());
        assert_eq!(extractor.analyze(&input).await.unwrap().len(), 1);
        let err = extractor.analyze(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
        assert_eq!(extractor.seen().len(), 2);
    }
}
