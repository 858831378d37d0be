//! The clause record shared by extraction, storage, and backups.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sort_key::clause_key;

/// Which source document a clause was taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// Baseline conditions shared across projects.
    #[default]
    General,
    /// Project-specific amendments to the baseline.
    Particular,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Particular => "Particular",
        }
    }

    /// Lenient parse used when decoding stored or model-produced documents.
    ///
    /// Anything that is not recognisably "particular" is treated as general.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("particular") {
            Self::Particular
        } else {
            Self::General
        }
    }
}

/// A single numbered contractual provision.
///
/// `clause_text`, `general_condition`, and `particular_condition` hold
/// HTML-annotated verbatim text. `comparison` and `time_frames` are opaque
/// lists produced by the extraction model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub clause_number: String,
    #[serde(default)]
    pub clause_title: String,
    #[serde(default)]
    pub clause_text: String,
    #[serde(default)]
    pub condition_type: ConditionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particular_condition: Option<String>,
    #[serde(default)]
    pub comparison: Vec<Value>,
    #[serde(default)]
    pub time_frames: Vec<Value>,
    #[serde(default)]
    pub has_time_frame: bool,
}

impl Clause {
    pub fn new(number: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            clause_number: number.into(),
            clause_title: title.into(),
            clause_text: text.into(),
            ..Self::default()
        }
    }

    /// Store-level identifier derived from the clause number.
    pub fn key(&self) -> String {
        clause_key(&self.clause_number)
    }

    /// A clause with at least one detected discrepancy is shown as modified.
    pub fn is_modified(&self) -> bool {
        !self.comparison.is_empty()
    }

    /// Recompute fields that are derived from other fields.
    pub fn refresh_derived(&mut self) {
        self.has_time_frame = !self.time_frames.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_type_lenient_parse() {
        assert_eq!(ConditionType::parse_lenient("Particular"), ConditionType::Particular);
        assert_eq!(ConditionType::parse_lenient(" particular "), ConditionType::Particular);
        assert_eq!(ConditionType::parse_lenient("General"), ConditionType::General);
        assert_eq!(ConditionType::parse_lenient("other"), ConditionType::General);
    }

    #[test]
    fn modified_follows_comparison() {
        let mut clause = Clause::new("1.1", "Definitions", "text");
        assert!(!clause.is_modified());
        clause.comparison.push(serde_json::json!({"field": "period", "general": "28 days"}));
        assert!(clause.is_modified());
    }

    #[test]
    fn refresh_derived_sets_time_frame_flag() {
        let mut clause = Clause::new("20.1", "Notice of Claims", "within 28 days");
        clause.has_time_frame = true;
        clause.refresh_derived();
        assert!(!clause.has_time_frame);
        clause.time_frames.push(serde_json::json!({"period": "28 days"}));
        clause.refresh_derived();
        assert!(clause.has_time_frame);
    }

    #[test]
    fn deserializes_with_missing_optional_fields() {
        let clause: Clause = serde_json::from_str(r#"{"clause_number": "4.2"}"#).unwrap();
        assert_eq!(clause.clause_number, "4.2");
        assert_eq!(clause.condition_type, ConditionType::General);
        assert!(clause.general_condition.is_none());
        assert_eq!(clause.key(), "C.4.2");
    }
}
