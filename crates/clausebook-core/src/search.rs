//! Free-text clause search.

use crate::clause::Clause;

/// Case-insensitive substring match over number, title, and every text variant.
pub fn matches_query(clause: &Clause, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        Some(clause.clause_number.as_str()),
        Some(clause.clause_title.as_str()),
        Some(clause.clause_text.as_str()),
        clause.general_condition.as_deref(),
        clause.particular_condition.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Clauses matching `query`, in the order given (callers pass canonical order).
pub fn search_clauses<'a>(clauses: &'a [Clause], query: &str) -> Vec<&'a Clause> {
    clauses.iter().filter(|c| matches_query(c, query)).collect()
}
