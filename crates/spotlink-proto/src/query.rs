//! Query extraction — ordered heuristics turning a sanitized title (plus an
//! optional channel name) into a structured track/artist guess.
//!
//! The heuristics are pure strategy functions evaluated in priority order;
//! the first one that produces a result wins. Explicit delimiter conventions
//! ("Artist - Track", "Track by Artist") outrank the weak channel-name
//! fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::sanitize::sanitize;

/// Structured guess derived from a video title. `raw_query` is populated
/// whenever any text was extractable and serves as the guaranteed search
/// fallback. When `track` and `artist` are both set they came from the same
/// delimiter pattern, never mixed from different heuristics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackQuery {
    pub track: Option<String>,
    pub artist: Option<String>,
    pub raw_query: Option<String>,
}

impl TrackQuery {
    fn from_pair(track: &str, artist: Option<&str>) -> Self {
        let raw_query = match artist {
            Some(a) => format!("{} {}", track, a),
            None => track.to_string(),
        };
        Self {
            track: Some(track.to_string()),
            artist: artist.map(str::to_string),
            raw_query: Some(raw_query),
        }
    }
}

/// Whitespace-delimited dash, the "Artist - Track" separator.
static DASH_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+-\s+").expect("dash regex"));

/// "Track by Artist" phrasing. Greedy left side, so the split lands on the
/// last ` by ` occurrence.
static BY_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+)\s+by\s+(.+)$").expect("by regex"));

/// Trailing `" - Topic"` on a channel name.  `\s*$` so a channel name with
/// trailing spaces still loses the suffix.
static CHANNEL_TOPIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+-\s+topic\s*$").expect("channel topic regex"));

type Strategy = fn(&str, Option<&str>) -> Option<TrackQuery>;

/// Priority order: first strategy to produce a result wins.
const STRATEGIES: &[Strategy] = &[dash_pattern, by_pattern, channel_fallback];

/// "Artist - Track": exactly two non-empty dash-delimited segments.
fn dash_pattern(text: &str, _channel: Option<&str>) -> Option<TrackQuery> {
    let parts: Vec<&str> = DASH_SPLIT.split(text).collect();
    match parts.as_slice() {
        [artist, track] if !artist.is_empty() && !track.is_empty() => {
            Some(TrackQuery::from_pair(track.trim(), Some(artist.trim())))
        }
        _ => None,
    }
}

/// "Track by Artist".
fn by_pattern(text: &str, _channel: Option<&str>) -> Option<TrackQuery> {
    let caps = BY_PHRASE.captures(text)?;
    let track = caps[1].trim().to_string();
    let artist = caps[2].trim().to_string();
    if track.is_empty() || artist.is_empty() {
        return None;
    }
    Some(TrackQuery::from_pair(&track, Some(&artist)))
}

/// Weakest heuristic: the whole text is the track; a supplied channel name,
/// minus any `" - Topic"` suffix, is the artist guess ("Topic" channels are
/// auto-generated and named after the artist).
fn channel_fallback(text: &str, channel: Option<&str>) -> Option<TrackQuery> {
    let artist = channel.and_then(|c| {
        let cleaned = CHANNEL_TOPIC.replace(c, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    });
    Some(TrackQuery::from_pair(text, artist.as_deref()))
}

/// Extract a [`TrackQuery`] from a raw title and optional channel name.
/// Sanitizes first; an empty sanitized title yields the all-`None` query.
pub fn extract(raw_title: &str, channel_name: Option<&str>) -> TrackQuery {
    let text = sanitize(raw_title);
    if text.is_empty() {
        return TrackQuery::default();
    }
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(&text, channel_name))
        .unwrap_or_default()
}
