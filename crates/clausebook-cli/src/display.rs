//! Terminal rendering for contracts, clauses, and users.

use std::borrow::Cow;
use std::sync::LazyLock;

use clausebook_core::{Clause, ContractMetadata, ContractSummary, UserProfile};

const MAX_TEXT_CHARS: usize = 600;
const MAX_LIST_ITEMS: usize = 10;

static TAG: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"<[^>]+>").expect("tag pattern compiles"));

// ── Public API ──

pub fn print_contracts(contracts: &[ContractSummary]) {
    if contracts.is_empty() {
        println!("No contracts.");
        return;
    }
    println!("{:<28} {:<36} {:<26} CREATED BY", "ID", "TITLE", "CREATED");
    for c in contracts {
        println!(
            "{:<28} {:<36} {:<26} {}",
            truncate(&c.id, 28),
            truncate(&c.meta.title, 36),
            c.meta.created_at,
            c.meta.created_by
        );
    }
}

/// One line per clause.
pub fn print_clause_list(clauses: &[Clause]) {
    if clauses.is_empty() {
        println!("No clauses.");
        return;
    }
    for clause in clauses {
        let marker = if clause.is_modified() { "*" } else { " " };
        let time = if clause.has_time_frame { "T" } else { " " };
        println!(
            "{marker}{time} {:<10} {:<10} {}",
            clause.clause_number,
            clause.condition_type.as_str(),
            clause.clause_title
        );
    }
    let meta = ContractMetadata::summarize(clauses);
    println!();
    println!(
        "{} clauses ({} general, {} particular, {} modified, {} time-sensitive)",
        meta.total_clauses,
        meta.general_count,
        meta.particular_count,
        meta.conflict_count,
        meta.time_sensitive_count
    );
}

/// A single clause as a vertical card.
pub fn print_clause_card(clause: &Clause) {
    println!("=== {} {} ===", clause.clause_number, clause.clause_title);
    println!("  key:        {}", clause.key());
    println!("  condition:  {}", clause.condition_type.as_str());
    println!();

    print_text("Text", &clause.clause_text);
    if let Some(text) = &clause.general_condition {
        print_text("General condition", text);
    }
    if let Some(text) = &clause.particular_condition {
        print_text("Particular condition", text);
    }
    print_values("Comparison", &clause.comparison);
    print_values("Time frames", &clause.time_frames);
}

pub fn print_users(users: &[(String, UserProfile)]) {
    println!("{:<30} {:<10} {:<26} UID", "EMAIL", "ROLE", "CREATED");
    for (uid, profile) in users {
        println!(
            "{:<30} {:<10} {:<26} {}",
            profile.email,
            profile.role.as_str(),
            profile.created_at,
            uid
        );
    }
}

// ── Helpers ──

fn print_text(label: &str, text: &str) {
    let plain = strip_tags(text);
    if plain.trim().is_empty() {
        return;
    }
    println!("--- {label} ---");
    println!("{}", truncate(plain.trim(), MAX_TEXT_CHARS));
    println!();
}

fn print_values(label: &str, values: &[serde_json::Value]) {
    if values.is_empty() {
        return;
    }
    println!("--- {label} ({}) ---", values.len());
    for value in values.iter().take(MAX_LIST_ITEMS) {
        match value {
            serde_json::Value::String(s) => println!("  - {s}"),
            other => println!("  - {other}"),
        }
    }
    if values.len() > MAX_LIST_ITEMS {
        println!("  ... and {} more", values.len() - MAX_LIST_ITEMS);
    }
    println!();
}

/// Drop the generated cross-reference anchors for terminal output.
fn strip_tags(text: &str) -> Cow<'_, str> {
    TAG.replace_all(text, "")
}

fn truncate(s: &str, max: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &s[..idx])),
        None => Cow::Borrowed(s),
    }
}
