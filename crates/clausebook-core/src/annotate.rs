//! Cross-reference linking for clause bodies.
//!
//! References like "Clause 4.2", "Sub-clause 14.1(b)" or "Article 7" are
//! wrapped in an internal anchor pointing at the referenced clause. The pass
//! is idempotent: a reference that already sits directly after a generated
//! anchor's opening tag is left alone.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::clause::Clause;

/// The tail of every generated anchor's opening tag.
const ANCHOR_OPEN_TAIL: &str = "class=\"clause-ref\">";

static CROSS_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:sub-clause|sub-paragraph|clause|article|paragraph)\s+(\d+(?:\.\d+)*)(?:\s*\([a-z]{1,4}\))?",
    )
    .expect("cross-reference pattern compiles")
});

/// Wrap every unlinked cross-reference in `text` in an anchor.
///
/// The anchor target uses the digits-and-dots form of the referenced number,
/// so "Clause 4.2(a)" links to `#clause-4.2`.
pub fn link_cross_references(text: &str) -> Cow<'_, str> {
    CROSS_REFERENCE.replace_all(text, |caps: &Captures| {
        let whole = &caps[0];
        let start = caps.get(0).map_or(0, |m| m.start());
        if text[..start].ends_with(ANCHOR_OPEN_TAIL) {
            return whole.to_string();
        }
        let target: String = caps[1]
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        format!("<a href=\"#clause-{target}\" {ANCHOR_OPEN_TAIL}{whole}</a>")
    })
}

/// Run [`link_cross_references`] over every text field of a clause.
pub fn annotate_clause(clause: &mut Clause) {
    relink(&mut clause.clause_text);
    if let Some(text) = clause.general_condition.as_mut() {
        relink(text);
    }
    if let Some(text) = clause.particular_condition.as_mut() {
        relink(text);
    }
}

fn relink(text: &mut String) {
    if let Cow::Owned(linked) = link_cross_references(text) {
        *text = linked;
    }
}
