//! Match resolver — one bounded catalog search per request, ranked against
//! the extracted guess.
//!
//! `resolve` never errors: no token, a failed search, or an empty candidate
//! list all degrade to `None`, which the caller turns into the generic
//! search-page URL.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use spotlink_proto::normalize::normalize;
use spotlink_proto::query::TrackQuery;

use crate::auth::TokenStore;

const SEARCH_LIMIT: &str = "5";
const SEARCH_MARKET: &str = "US";

/// Exact normalized name match.
const SCORE_EXACT: f32 = 3.0;
/// Substring relation in either direction.
const SCORE_SUBSTRING: f32 = 2.0;
/// Bonus when a candidate artist matches the extracted artist.  Small enough
/// that a substring match plus the bonus never outranks an exact name match;
/// it only breaks ties between equally related names.
const SCORE_ARTIST_BONUS: f32 = 0.5;

// ── wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SearchCandidate>,
}

/// One search result, scoped to a single resolution call.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

// ── client ────────────────────────────────────────────────────────────────────

pub struct SpotifyClient {
    http: reqwest::Client,
    api_url: String,
    tokens: Arc<TokenStore>,
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client, api_url: String, tokens: Arc<TokenStore>) -> Self {
        Self {
            http,
            api_url,
            tokens,
        }
    }

    /// Resolve a query to a canonical track URL, or `None` meaning "no
    /// confident match — fall back to the search page".
    pub async fn resolve(&self, query: &TrackQuery) -> Option<String> {
        // Nothing extractable: an empty q would only buy a 400 and the same
        // fallback, so skip the round trip.
        let q = build_search_query(query);
        if q.is_empty() {
            return None;
        }

        let token = self.tokens.get_token(true).await?;

        let resp = match self
            .http
            .get(format!("{}/v1/search", self.api_url))
            .query(&[
                ("q", q.as_str()),
                ("type", "track"),
                ("limit", SEARCH_LIMIT),
                ("market", SEARCH_MARKET),
            ])
            .bearer_auth(token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Catalog search failed: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!("Catalog search returned {}", resp.status());
            return None;
        }

        let body: SearchResponse = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Catalog search returned unparseable body: {}", e);
                return None;
            }
        };
        let items = body.tracks.unwrap_or_default().items;
        if items.is_empty() {
            debug!("Catalog search returned zero candidates for {:?}", q);
            return None;
        }

        let best = match &query.track {
            // No track extracted: no ranking possible, first candidate wins.
            None => &items[0],
            Some(track) => rank_candidates(&items, track, query.artist.as_deref()),
        };
        Some(track_url(&best.id))
    }
}

// ── query construction ────────────────────────────────────────────────────────

/// Field-qualified query when both track and artist are known (quotes
/// stripped from the inputs so they cannot break the query syntax),
/// otherwise the raw fallback text verbatim.
pub fn build_search_query(query: &TrackQuery) -> String {
    match (&query.track, &query.artist) {
        (Some(track), Some(artist)) => format!(
            "track:\"{}\" artist:\"{}\"",
            track.replace('"', ""),
            artist.replace('"', "")
        ),
        _ => query.raw_query.clone().unwrap_or_default(),
    }
}

// ── ranking ───────────────────────────────────────────────────────────────────

/// Score every candidate against the normalized guess; maximum wins,
/// first-seen wins ties (stable by input order).
fn rank_candidates<'a>(
    items: &'a [SearchCandidate],
    track: &str,
    artist: Option<&str>,
) -> &'a SearchCandidate {
    let target = normalize(track);
    let target_artist = artist.map(normalize);

    let mut best = &items[0];
    let mut best_score = -1.0f32;

    for candidate in items {
        let name = normalize(&candidate.name);
        let mut score = if name == target {
            SCORE_EXACT
        } else if name.contains(&target) || target.contains(&name) {
            SCORE_SUBSTRING
        } else {
            0.0
        };

        if let Some(ta) = &target_artist {
            let artist_hit = candidate.artists.iter().any(|a| {
                let na = normalize(&a.name);
                na == *ta || na.contains(ta.as_str()) || ta.contains(na.as_str())
            });
            if artist_hit {
                score += SCORE_ARTIST_BONUS;
            }
        }

        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }

    best
}

// ── URLs ──────────────────────────────────────────────────────────────────────

/// Canonical deep link to one catalog entry.
pub fn track_url(id: &str) -> String {
    format!("https://open.spotify.com/track/{}", id)
}

/// Generic search page — the guaranteed lower-quality fallback.  An empty
/// query encodes to the bare search page.
pub fn search_fallback_url(raw_query: &str) -> String {
    format!(
        "https://open.spotify.com/search/{}",
        urlencoding::encode(raw_query)
    )
}
