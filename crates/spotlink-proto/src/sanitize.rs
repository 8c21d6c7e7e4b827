//! Title sanitizer — strips decorative noise from raw video titles.
//!
//! Pipeline order matters: later passes assume earlier cleanup (the feat
//! stripper, for example, expects bracketed feat credits to already be gone).

use once_cell::sync::Lazy;
use regex::Regex;

/// Lowercased junk phrases. A bracketed group is dropped when its inner text
/// contains any of these as a substring.
const JUNK_TAGS: &[&str] = &[
    "official video",
    "official music video",
    "music video",
    "official audio",
    "audio",
    "lyrics",
    "lyric video",
    "visualizer",
    "mv",
    "pv",
    "hd",
    "4k",
    "remastered",
    "prod.",
    "prod",
    "prod by",
    "live performance",
    "live",
    "cover",
    "teaser",
];

/// Emoji, pictographs, and zero-width joiners.
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\x{200D}]").expect("emoji regex")
});

/// Straight and curly double quotes.
static QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["“”]+"#).expect("quotes regex"));

/// One bracketed group, `(...)` or `[...]`, capturing the inner text.
static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(\[]([^)\]]+)[)\]]").expect("bracket regex"));

/// Inner text that is exactly a 4-digit year (optionally space-padded).
static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d{4}\s*$").expect("year regex"));

/// Trailing `feat.` / `ft.` clause and everything after it.
static FEAT_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(feat\.?|ft\.?)\s+.+$").expect("feat regex"));

/// Trailing `" - Topic"` suffix (auto-generated channel naming artifact).
/// Anchored through `\s*$` because whitespace is only collapsed at the end
/// of the pipeline, and raw titles can carry trailing spaces.
static TOPIC_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+-\s+topic\s*$").expect("topic regex"));

fn is_junk_bracket(inner: &str) -> bool {
    let low = inner.to_lowercase();
    JUNK_TAGS.iter().any(|tag| low.contains(tag)) || YEAR_ONLY.is_match(inner)
}

/// Strip decorative noise from a raw video title.
///
/// Bracketed content that does not positively match the junk vocabulary is
/// kept but unwrapped: ambiguous parentheticals are assumed meaningful.
/// Never fails; empty input yields an empty string.
pub fn sanitize(raw_title: &str) -> String {
    let t = EMOJI.replace_all(raw_title, "");
    let t = QUOTES.replace_all(&t, "");
    let t = BRACKETED.replace_all(&t, |caps: &regex::Captures| {
        let inner = &caps[1];
        if is_junk_bracket(inner) {
            String::new()
        } else {
            format!(" {} ", inner)
        }
    });
    let t = FEAT_CLAUSE.replace(&t, "");
    let t = TOPIC_SUFFIX.replace(&t, "");
    t.split_whitespace().collect::<Vec<_>>().join(" ")
}
