//! The archival contract unit used by backups and the legacy local archive.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::clause::{Clause, ConditionType};
use crate::decode::ClauseDocument;

/// Summary counts over a contract's clauses.
///
/// Always recomputed from the clauses on save; a stored copy is never trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    pub total_clauses: usize,
    pub general_count: usize,
    pub particular_count: usize,
    pub conflict_count: usize,
    pub time_sensitive_count: usize,
}

impl ContractMetadata {
    pub fn summarize(clauses: &[Clause]) -> Self {
        let mut meta = Self {
            total_clauses: clauses.len(),
            ..Self::default()
        };
        for clause in clauses {
            match clause.condition_type {
                ConditionType::General => meta.general_count += 1,
                ConditionType::Particular => meta.particular_count += 1,
            }
            if clause.is_modified() {
                meta.conflict_count += 1;
            }
            if clause.has_time_frame || !clause.time_frames.is_empty() {
                meta.time_sensitive_count += 1;
            }
        }
        meta
    }
}

/// A contract snapshot as written to a backup file or the legacy archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// ISO 8601 timestamp string. Older archives stored epoch milliseconds.
    #[serde(default, deserialize_with = "timestamp_string")]
    pub timestamp: String,
    /// Read through the clause document decoder, so archives written by
    /// older clients keep their legacy field names.
    #[serde(deserialize_with = "clause_documents")]
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub metadata: ContractMetadata,
}

impl SavedContract {
    pub fn new(
        id: Option<String>,
        name: impl Into<String>,
        timestamp: impl Into<String>,
        clauses: Vec<Clause>,
    ) -> Self {
        let metadata = ContractMetadata::summarize(&clauses);
        Self {
            id,
            name: name.into(),
            timestamp: timestamp.into(),
            clauses,
            metadata,
        }
    }

    /// Replace whatever metadata was loaded with a fresh summary.
    pub fn refresh_metadata(&mut self) {
        self.metadata = ContractMetadata::summarize(&self.clauses);
    }
}

fn timestamp_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn clause_documents<'de, D>(deserializer: D) -> Result<Vec<Clause>, D::Error>
where
    D: Deserializer<'de>,
{
    let docs = Vec::<ClauseDocument>::deserialize(deserializer)?;
    Ok(docs.into_iter().map(|doc| doc.into_clause(None)).collect())
}
