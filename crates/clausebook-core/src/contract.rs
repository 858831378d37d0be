//! Contract metadata, display-name detection, and id derivation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::clause::Clause;

/// Title the extraction model uses when it cannot find a heading.
pub const UNTITLED: &str = "Untitled";

/// Metadata document stored alongside a contract's clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMeta {
    pub title: String,
    pub created_by: String,
    /// ISO 8601 timestamp string.
    pub created_at: String,
}

impl ContractMeta {
    pub fn new(title: impl Into<String>, created_by: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            created_by: created_by.into(),
            created_at: iso_timestamp(now),
        }
    }
}

/// One row of the contract list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub id: String,
    pub meta: ContractMeta,
}

/// Fixed-width UTC timestamp, so lexicographic order is chronological order.
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Pick a display name for a freshly analysed contract.
///
/// Expects `clauses` in canonical order. The first clause with a real title
/// wins; otherwise the name is "Analysis <date>".
pub fn detect_contract_name(clauses: &[Clause], now: DateTime<Utc>) -> String {
    clauses
        .iter()
        .map(|c| c.clause_title.trim())
        .find(|title| !title.is_empty() && *title != UNTITLED)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Analysis {}", now.format("%Y-%m-%d")))
}

/// Strip a name down to ASCII alphanumerics. `None` if nothing survives.
pub fn contract_id_from_name(name: &str) -> Option<String> {
    let id: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
    (!id.is_empty()).then_some(id)
}

/// A caller-supplied contract id, trimmed. Kept verbatim otherwise.
pub fn explicit_contract_id(id: Option<&str>) -> Option<String> {
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Contract id for a detected name, falling back to a timestamp-based id.
pub fn derive_contract_id(name: &str, now: DateTime<Utc>) -> String {
    contract_id_from_name(name).unwrap_or_else(|| format!("contract{}", now.timestamp_millis()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn first_real_title_wins() {
        let clauses = vec![
            Clause::new("1", "Untitled", ""),
            Clause::new("1.1", "", ""),
            Clause::new("2", "General Provisions", ""),
            Clause::new("3", "The Employer", ""),
        ];
        assert_eq!(detect_contract_name(&clauses, fixed_now()), "General Provisions");
    }

    #[test]
    fn falls_back_to_dated_analysis() {
        let clauses = vec![Clause::new("1", "Untitled", "")];
        assert_eq!(detect_contract_name(&clauses, fixed_now()), "Analysis 2026-03-14");
        assert_eq!(detect_contract_name(&[], fixed_now()), "Analysis 2026-03-14");
    }

    #[test]
    fn id_strips_non_alphanumerics() {
        assert_eq!(
            contract_id_from_name("General Provisions (2017 ed.)").as_deref(),
            Some("GeneralProvisions2017ed")
        );
        assert_eq!(contract_id_from_name("-- / --"), None);
    }

    #[test]
    fn explicit_id_kept_verbatim() {
        assert_eq!(explicit_contract_id(Some(" gc-2017 ")).as_deref(), Some("gc-2017"));
        assert_eq!(explicit_contract_id(Some("  ")), None);
        assert_eq!(explicit_contract_id(None), None);
    }

    #[test]
    fn empty_id_falls_back_to_timestamp() {
        let id = derive_contract_id("!!!", fixed_now());
        assert_eq!(id, format!("contract{}", fixed_now().timestamp_millis()));
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let early = iso_timestamp(fixed_now());
        let late = iso_timestamp(fixed_now() + chrono::Duration::days(400));
        assert!(early < late);
        assert!(early.ends_with('Z'));
    }

    #[test]
    fn meta_serializes_camel_case() {
        let meta = ContractMeta::new("Red Book", "admin@example.com", fixed_now());
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["createdBy"], "admin@example.com");
        assert!(json["createdAt"].as_str().unwrap().starts_with("2026-03-14T09:30:00"));
    }
}
