//! Schema-versioned decoding of stored clause documents.
//!
//! Clause documents have been written by several generations of clients.
//! All defaulting rules live here:
//!
//! | field            | fallback chain                                   |
//! |------------------|--------------------------------------------------|
//! | `clause_number`  | `clause_number` → `number` → `id` → document key |
//! | `clause_title`   | `clause_title` → `title` → ""                    |
//! | `clause_text`    | `clause_text` → `text` → ""                      |
//! | `condition_type` | lenient parse, default General                   |
//! | `has_time_frame` | stored flag, else `!time_frames.is_empty()`      |

use serde::Deserialize;
use serde_json::Value;

use crate::clause::{Clause, ConditionType};
use crate::sort_key::KEY_PREFIX;

/// Version stamped on every clause document this crate writes.
pub const CLAUSE_SCHEMA_VERSION: u32 = 2;

/// Raw clause document as found in the store or an import file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClauseDocument {
    pub schema_version: Option<u32>,
    pub clause_number: Option<String>,
    pub number: Option<Value>,
    pub id: Option<Value>,
    pub clause_title: Option<String>,
    pub title: Option<String>,
    pub clause_text: Option<String>,
    pub text: Option<String>,
    pub condition_type: Option<String>,
    pub general_condition: Option<String>,
    pub particular_condition: Option<String>,
    pub comparison: Option<Vec<Value>>,
    pub time_frames: Option<Vec<Value>>,
    pub has_time_frame: Option<bool>,
}

impl ClauseDocument {
    /// Apply the defaulting rules. `doc_key` is the store key, if any.
    pub fn into_clause(self, doc_key: Option<&str>) -> Clause {
        let clause_number = self
            .clause_number
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.number.as_ref().and_then(scalar_string))
            .or_else(|| self.id.as_ref().and_then(scalar_string))
            .or_else(|| doc_key.map(|k| k.strip_prefix(KEY_PREFIX).unwrap_or(k).to_string()))
            .unwrap_or_default();

        let time_frames = self.time_frames.unwrap_or_default();
        let has_time_frame = self.has_time_frame.unwrap_or(!time_frames.is_empty());

        Clause {
            clause_number,
            clause_title: self.clause_title.or(self.title).unwrap_or_default(),
            clause_text: self.clause_text.or(self.text).unwrap_or_default(),
            condition_type: self
                .condition_type
                .as_deref()
                .map(ConditionType::parse_lenient)
                .unwrap_or_default(),
            general_condition: self.general_condition,
            particular_condition: self.particular_condition,
            comparison: self.comparison.unwrap_or_default(),
            time_frames,
            has_time_frame,
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode one stored clause document.
pub fn decode_clause(value: Value, doc_key: Option<&str>) -> Result<Clause, serde_json::Error> {
    let doc: ClauseDocument = serde_json::from_value(value)?;
    Ok(doc.into_clause(doc_key))
}

/// Encode a clause for storage, stamped with the current schema version.
pub fn encode_clause(clause: &Clause) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(clause)?;
    if let Value::Object(map) = &mut value {
        map.insert("schema_version".into(), Value::from(CLAUSE_SCHEMA_VERSION));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_documents_decode_verbatim() {
        let mut clause = Clause::new("4.2", "Performance Security", "The Contractor shall...");
        clause.condition_type = ConditionType::Particular;
        clause.particular_condition = Some("10% of the Contract Price".into());
        let encoded = encode_clause(&clause).unwrap();
        assert_eq!(encoded["schema_version"], CLAUSE_SCHEMA_VERSION);
        assert_eq!(decode_clause(encoded, Some("C.4.2")).unwrap(), clause);
    }

    #[test]
    fn number_falls_back_to_legacy_fields() {
        let clause = decode_clause(json!({"number": "3.1", "title": "Engineer"}), None).unwrap();
        assert_eq!(clause.clause_number, "3.1");
        assert_eq!(clause.clause_title, "Engineer");

        let clause = decode_clause(json!({"id": 7, "text": "body"}), None).unwrap();
        assert_eq!(clause.clause_number, "7");
        assert_eq!(clause.clause_text, "body");
    }

    #[test]
    fn number_falls_back_to_document_key() {
        let clause = decode_clause(json!({"clause_number": ""}), Some("C.12.3")).unwrap();
        assert_eq!(clause.clause_number, "12.3");
    }

    #[test]
    fn time_frame_flag_derived_when_absent() {
        let clause = decode_clause(
            json!({"clause_number": "20.1", "time_frames": [{"period": "28 days"}]}),
            None,
        )
        .unwrap();
        assert!(clause.has_time_frame);

        let clause = decode_clause(json!({"clause_number": "20.2"}), None).unwrap();
        assert!(!clause.has_time_frame);
    }

    #[test]
    fn unknown_condition_type_defaults_to_general() {
        let clause =
            decode_clause(json!({"clause_number": "1", "condition_type": "mixed"}), None).unwrap();
        assert_eq!(clause.condition_type, ConditionType::General);
    }
}
