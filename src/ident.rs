//! Identifier normalization and the uncensored marker.
//!
//! Every place that needs to recognise an identifier or a `-U`/`-UC` suffix
//! goes through this module so the rules cannot drift apart.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CANONICAL_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]+-\d+$").expect("valid regex"));
static CANONICAL_FIND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]+-\d+").expect("valid regex"));
static TITLE_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z0-9]+-\d+").expect("valid regex"));
// The regex crate has no lookahead, so the "not followed by an alphanumeric"
// guard is matched as a trailing class or end of input.
static UNCENSORED_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)-(UC|U)(?:[^A-Za-z0-9]|$)").expect("valid regex")
});

/// Variant named by a trailing uncensored marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UncensoredKind {
    #[default]
    None,
    U,
    UC,
}

/// Canonical form of a user-supplied identifier.
///
/// Whitespace is removed, `_` becomes `-`, letters are uppercased, and the
/// first `LETTERS-DIGITS` token is extracted when the whole string is not
/// already exactly that shape. Applying it twice gives the same result.
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '_' { '-' } else { c })
        .collect::<String>()
        .to_uppercase();
    if CANONICAL_EXACT.is_match(&cleaned) {
        return cleaned;
    }
    CANONICAL_FIND
        .find(&cleaned)
        .map(|m| m.as_str().to_string())
        .unwrap_or(cleaned)
}

/// First `[A-Z0-9]+-\d+` token of a title, uppercased.
pub fn extract_from_title(title: &str) -> Option<String> {
    TITLE_IDENT
        .find(&title.to_uppercase())
        .map(|m| m.as_str().to_string())
}

/// Detects a trailing `-U` or `-UC` marker after an identifier's digits.
pub fn uncensored_marker(text: &str) -> UncensoredKind {
    match UNCENSORED_MARKER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
        .as_deref()
    {
        Some("UC") => UncensoredKind::UC,
        Some("U") => UncensoredKind::U,
        _ => UncensoredKind::None,
    }
}
