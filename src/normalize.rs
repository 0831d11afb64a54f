//! Deterministic key normalization
//!
//! Record keys are built from free text found on the page (section titles,
//! field labels, subsection markers), so they are funneled through a single
//! normalization: accents stripped, whitespace runs collapsed to `_`,
//! anything outside `[A-Za-z0-9_]` dropped, lowercased.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Normalize free text into a safe, comparable key fragment.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    // NFD splits accented characters into base + combining mark; dropping
    // every non-ASCII char then leaves the bare base letter.
    let ascii: String = text.nfd().filter(char::is_ascii).collect();
    let underscored = WHITESPACE_RE.replace_all(&ascii, "_");
    let stripped = NON_KEY_RE.replace_all(&underscored, "");
    stripped.to_lowercase()
}
