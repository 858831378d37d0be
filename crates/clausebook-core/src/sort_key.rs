//! Canonical key and ordering for contract clause numbers.
//!
//! Clause numbers are free text ("4.2", "4.2(a)", "14.1.3"). Two things are
//! derived from them:
//!
//! - a store key, used as the document id of the clause within its contract;
//! - a total order, used everywhere clauses are displayed or merged.
//!
//! # Ordering rules
//!
//! - Split on `.` and read the leading digits of each segment ("2(a)" → 2).
//! - A segment with no leading digits counts as 0.
//! - Compare segment by segment; missing trailing segments count as 0.
//! - Fully equal numbers keep their input order (stable sort).

use std::cmp::Ordering;

use crate::clause::Clause;

/// Prefix of every canonical clause key.
pub const KEY_PREFIX: &str = "C.";

/// Derive the store key for a clause number.
///
/// Every character outside `[0-9.]` is dropped, so "4.2(a)" and "4.2" share
/// the key "C.4.2" and overwrite each other on save.
pub fn clause_key(number: &str) -> String {
    let digits: String = number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    format!("{KEY_PREFIX}{digits}")
}

/// Numeric value of each dot-separated segment.
pub fn numeric_segments(number: &str) -> Vec<u64> {
    number.trim().split('.').map(leading_number).collect()
}

fn leading_number(segment: &str) -> u64 {
    let segment = segment.trim_start();
    let digit_end = segment
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(segment.len());
    if digit_end == 0 {
        return 0;
    }
    // Only overflow can fail here; saturate so huge numbers still sort last.
    segment[..digit_end].parse().unwrap_or(u64::MAX)
}

/// Compare two clause numbers in canonical order.
pub fn compare_clause_numbers(a: &str, b: &str) -> Ordering {
    let left = numeric_segments(a);
    let right = numeric_segments(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Sort clauses in place by canonical order. Stable.
pub fn sort_clauses(clauses: &mut [Clause]) {
    clauses.sort_by(|a, b| compare_clause_numbers(&a.clause_number, &b.clause_number));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(numbers: &[&str]) -> Vec<String> {
        let mut clauses: Vec<Clause> = numbers.iter().map(|n| Clause::new(*n, "", "")).collect();
        sort_clauses(&mut clauses);
        clauses.into_iter().map(|c| c.clause_number).collect()
    }

    #[test]
    fn numeric_not_lexicographic() {
        assert_eq!(sorted(&["10", "2.1", "2", "2.10"]), vec!["2", "2.1", "2.10", "10"]);
    }

    #[test]
    fn sorting_twice_is_stable() {
        let once = sorted(&["3.1", "1", "12.4", "3", "1.2.1", "1.2"]);
        let refs: Vec<&str> = once.iter().map(String::as_str).collect();
        assert_eq!(sorted(&refs), once);
        assert_eq!(once, vec!["1", "1.2", "1.2.1", "3", "3.1", "12.4"]);
    }

    #[test]
    fn missing_segments_count_as_zero() {
        assert_eq!(compare_clause_numbers("2", "2.0"), Ordering::Equal);
        assert_eq!(compare_clause_numbers("2", "2.1"), Ordering::Less);
    }

    #[test]
    fn equal_numbers_keep_input_order() {
        let mut clauses = vec![
            Clause::new("4.2(a)", "first", ""),
            Clause::new("1", "", ""),
            Clause::new("4.2(b)", "second", ""),
        ];
        sort_clauses(&mut clauses);
        assert_eq!(clauses[1].clause_title, "first");
        assert_eq!(clauses[2].clause_title, "second");
    }

    #[test]
    fn non_numeric_segment_is_zero() {
        assert_eq!(numeric_segments("A.3"), vec![0, 3]);
        assert_eq!(numeric_segments("4.2(a)"), vec![4, 2]);
        assert_eq!(numeric_segments(""), vec![0]);
    }

    #[test]
    fn key_strips_everything_but_digits_and_dots() {
        assert_eq!(clause_key("4.2(a)"), "C.4.2");
        assert_eq!(clause_key("4-2a"), "C.42");
        assert_eq!(clause_key("Clause 14.1"), "C.14.1");
    }

    #[test]
    fn differently_formatted_numbers_collide() {
        assert_eq!(clause_key("4.2(a)"), clause_key("4.2 (b)"));
    }

    #[test]
    fn overflowing_segment_sorts_last() {
        assert_eq!(
            compare_clause_numbers("99999999999999999999999", "5"),
            Ordering::Greater
        );
    }
}
