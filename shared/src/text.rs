//! Accent/case-insensitive string comparison
//!
//! City and province names arrive with inconsistent casing and diacritics
//! ("Montréal" vs "montreal"); comparisons normalize both sides first.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Decompose, strip combining marks, and lowercase.
pub fn normalize(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Equality ignoring case and accents.
pub fn eq_ignore_accents(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Membership in `list`, ignoring case and accents.
pub fn contains_ignore_accents<S: AsRef<str>>(needle: &str, list: &[S]) -> bool {
    let normalized = normalize(needle);
    list.iter().any(|item| normalize(item.as_ref()) == normalized)
}
