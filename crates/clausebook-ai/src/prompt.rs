//! Prompt construction and model-response parsing.

use clausebook_core::{Clause, decode_clause};
use serde_json::Value;
use tracing::warn;

use crate::ExtractError;
use crate::extractor::AnalysisInput;

pub const SYSTEM_PROMPT: &str = "You are a construction contract analyst. \
Extract every numbered clause from the supplied contract text. \
Respond with a JSON array only, no prose. Each element must have: \
clause_number (string, e.g. \"4.2\"), clause_title, clause_text, \
condition_type (\"General\" or \"Particular\"), general_condition, \
particular_condition, comparison (array), time_frames (array of objects \
describing any deadline or notice period), has_time_frame (boolean).";

/// The user turn for one extractor call.
pub fn user_prompt(input: &AnalysisInput) -> String {
    match input {
        AnalysisInput::Single(text) => format!(
            "Extract the clauses from this contract text.\n\n<contract>\n{text}\n</contract>"
        ),
        AnalysisInput::Dual {
            general,
            particular,
        } => format!(
            "Compare the general conditions with the particular conditions. \
For every clause, report the general wording in general_condition, the \
particular wording in particular_condition, and set condition_type to \
\"Particular\" where the particular conditions amend the clause. List each \
difference in comparison.\n\n<general>\n{general}\n</general>\n\n\
<particular>\n{particular}\n</particular>"
        ),
    }
}

/// Parse the model's text reply into clauses.
///
/// Accepts a bare array, an array inside a code fence, or an object with a
/// `clauses` array. Items without a clause number are dropped.
pub fn parse_clauses(reply: &str) -> Result<Vec<Clause>, ExtractError> {
    let body = strip_code_fence(reply);
    let items = match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("clauses") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ExtractError::Failed(
                    "model response has no clause list".into(),
                ));
            }
        },
        _ => {
            return Err(ExtractError::Failed(
                "model response is not a clause list".into(),
            ));
        }
    };

    let mut clauses = Vec::with_capacity(items.len());
    for item in items {
        let clause = decode_clause(item, None)?;
        if clause.clause_number.trim().is_empty() {
            warn!(title = %clause.clause_title, "dropping extracted clause without a number");
            continue;
        }
        clauses.push(clause);
    }
    Ok(clauses)
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (`json`) up to the first newline.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
