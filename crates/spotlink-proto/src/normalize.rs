//! Text canonicalization for fuzzy title/artist comparison.
//!
//! Both sides of every equality or containment check in the match ranking go
//! through [`normalize`] — comparing a normalized string against a raw one is
//! a correctness bug, not a style issue.

use unicode_normalization::UnicodeNormalization;

/// Canonicalize free text for case/diacritic/punctuation-insensitive
/// comparison.
///
/// Lowercases, applies NFKD so diacritics fall out as combining marks, keeps
/// only letters/digits/whitespace, then collapses whitespace runs and trims.
/// Total function: never fails, empty input yields `""`. Idempotent.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .nfkd()
        // NFKD pushes diacritics out as combining marks, which are neither
        // alphanumeric nor whitespace and so get dropped here.
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_diacritics() {
        assert_eq!(normalize("Café"), "cafe");
        assert_eq!(normalize("Café"), normalize("cafe"));
        assert_eq!(normalize("Beyoncé"), "beyonce");
    }

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize("Don't  Stop -- Me, Now!"), "dont stop me now");
        assert_eq!(normalize("  A   B  "), "a b");
    }

    #[test]
    fn idempotent() {
        for s in ["Café del Mar", "ÆØÅ — test", "song (remix)", ""] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!!!"), "");
    }
}
