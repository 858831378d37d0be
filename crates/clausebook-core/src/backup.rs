//! Contract backup files: validation on import, serialisation on export.
//!
//! A backup is a pretty-printed [`SavedContract`] JSON document.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::decode::decode_clause;
use crate::saved::SavedContract;
use crate::sort_key::sort_clauses;
use crate::ValidationError;

/// Parse and validate a backup file.
///
/// Checks run in a fixed order so each malformed shape gets its own error:
/// name, presence of `clauses`, list-ness, non-emptiness. Clauses are decoded
/// leniently and returned in canonical order; metadata is recomputed.
pub fn parse_backup(json: &str) -> Result<SavedContract, ValidationError> {
    let value: Value = serde_json::from_str(json)?;

    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingName)?;
    let raw_clauses = value
        .get("clauses")
        .ok_or(ValidationError::MissingClauses)?
        .as_array()
        .ok_or(ValidationError::ClausesNotAList)?;
    if raw_clauses.is_empty() {
        return Err(ValidationError::EmptyClauses);
    }

    let mut clauses = raw_clauses
        .iter()
        .map(|raw| decode_clause(raw.clone(), None))
        .collect::<Result<Vec<_>, _>>()?;
    sort_clauses(&mut clauses);

    let id = value.get("id").and_then(Value::as_str).map(str::to_string);
    let timestamp = match value.get("timestamp") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    debug!(name, clauses = clauses.len(), "parsed backup file");
    Ok(SavedContract::new(id, name, timestamp, clauses))
}

/// Serialise a contract as a backup file body (2-space indentation).
pub fn export_backup(contract: &SavedContract) -> Result<String, serde_json::Error> {
    let mut contract = contract.clone();
    contract.refresh_metadata();
    serde_json::to_string_pretty(&contract)
}

/// `<sanitized-name>_Backup_<YYYY-MM-DD>.json`
pub fn backup_file_name(name: &str, now: DateTime<Utc>) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{sanitized}_Backup_{}.json", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Clause;
    use chrono::TimeZone;

    #[test]
    fn rejects_missing_name_first() {
        let err = parse_backup(r#"{"clauses": []}"#).unwrap_err();
        assert!(matches!(err, ValidationError::MissingName));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn rejects_empty_clause_list() {
        let err = parse_backup(r#"{"name": "X", "clauses": []}"#).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyClauses));
    }

    #[test]
    fn rejects_missing_and_non_list_clauses() {
        assert!(matches!(
            parse_backup(r#"{"name": "X"}"#),
            Err(ValidationError::MissingClauses)
        ));
        assert!(matches!(
            parse_backup(r#"{"name": "X", "clauses": {"a": 1}}"#),
            Err(ValidationError::ClausesNotAList)
        ));
    }

    #[test]
    fn rejects_non_string_name() {
        assert!(matches!(
            parse_backup(r#"{"name": 7, "clauses": [{"clause_number": "1"}]}"#),
            Err(ValidationError::MissingName)
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(parse_backup("{not json"), Err(ValidationError::Json(_))));
    }

    #[test]
    fn export_then_import_keeps_count_and_order() {
        let clauses = vec![
            Clause::new("2", "Employer", "a"),
            Clause::new("2.1", "Access", "b"),
            Clause::new("2.10", "Permits", "c"),
            Clause::new("10", "Taking Over", "d"),
        ];
        let saved = SavedContract::new(
            Some("RedBook".into()),
            "Red Book",
            "2026-01-01T00:00:00.000Z",
            clauses,
        );
        let json = export_backup(&saved).unwrap();
        assert!(json.contains("\n  \"name\": \"Red Book\""));

        let restored = parse_backup(&json).unwrap();
        assert_eq!(restored.clauses.len(), 4);
        let numbers: Vec<&str> = restored.clauses.iter().map(|c| c.clause_number.as_str()).collect();
        assert_eq!(numbers, vec!["2", "2.1", "2.10", "10"]);
        assert_eq!(restored.id.as_deref(), Some("RedBook"));
        assert_eq!(restored.metadata.total_clauses, 4);
    }

    #[test]
    fn import_sorts_into_canonical_order() {
        let json = r#"{"name": "X", "clauses": [
            {"clause_number": "10"}, {"clause_number": "2"}, {"number": "1.5"}
        ]}"#;
        let saved = parse_backup(json).unwrap();
        let numbers: Vec<&str> = saved.clauses.iter().map(|c| c.clause_number.as_str()).collect();
        assert_eq!(numbers, vec!["1.5", "2", "10"]);
    }

    #[test]
    fn file_name_pattern() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(
            backup_file_name("Red Book (2017)", now),
            "Red_Book__2017__Backup_2026-10-16.json"
        );
    }
}
