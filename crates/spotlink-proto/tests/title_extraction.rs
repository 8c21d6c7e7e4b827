//! End-to-end extraction corpus: raw title + channel name in, structured
//! query out.  These run the full sanitize → heuristic chain.

use spotlink_proto::query::{extract, TrackQuery};

fn q(track: Option<&str>, artist: Option<&str>, raw: Option<&str>) -> TrackQuery {
    TrackQuery {
        track: track.map(str::to_string),
        artist: artist.map(str::to_string),
        raw_query: raw.map(str::to_string),
    }
}

#[test]
fn artist_dash_track_with_decorations() {
    let cases = [
        (
            "Daft Punk - One More Time (Official Video)",
            q(Some("One More Time"), Some("Daft Punk"), Some("One More Time Daft Punk")),
        ),
        (
            "Queen - Bohemian Rhapsody [Remastered] (2011)",
            q(
                Some("Bohemian Rhapsody"),
                Some("Queen"),
                Some("Bohemian Rhapsody Queen"),
            ),
        ),
        (
            "🎵 Tame Impala - The Less I Know The Better 🎵",
            q(
                Some("The Less I Know The Better"),
                Some("Tame Impala"),
                Some("The Less I Know The Better Tame Impala"),
            ),
        ),
    ];
    for (title, expected) in cases {
        assert_eq!(extract(title, None), expected, "title: {title}");
    }
}

#[test]
fn feat_clause_does_not_leak_into_query() {
    let got = extract("Artist - Song feat. Guest Star (Official Audio)", None);
    assert_eq!(got.track.as_deref(), Some("Song"));
    assert_eq!(got.artist.as_deref(), Some("Artist"));
}

#[test]
fn non_junk_parenthetical_survives_extraction() {
    let got = extract("Artist - Song (Acoustic Version)", None);
    assert_eq!(got.track.as_deref(), Some("Song Acoustic Version"));
}

#[test]
fn track_by_artist_phrasing() {
    let got = extract("Hallelujah by Jeff Buckley", None);
    assert_eq!(
        got,
        q(
            Some("Hallelujah"),
            Some("Jeff Buckley"),
            Some("Hallelujah Jeff Buckley")
        )
    );
}

#[test]
fn topic_channel_supplies_artist() {
    let got = extract("Windowlicker", Some("Aphex Twin - Topic"));
    assert_eq!(
        got,
        q(
            Some("Windowlicker"),
            Some("Aphex Twin"),
            Some("Windowlicker Aphex Twin")
        )
    );
}

#[test]
fn plain_channel_used_verbatim() {
    let got = extract("Some Obscure Demo", Some("BandChannel"));
    assert_eq!(got.artist.as_deref(), Some("BandChannel"));
}

#[test]
fn channel_that_is_only_topic_suffix_gives_no_artist() {
    let got = extract("Some Title", Some("  - Topic"));
    assert_eq!(got.track.as_deref(), Some("Some Title"));
    assert_eq!(got.artist, None);
}

#[test]
fn title_reduced_to_nothing_by_sanitizer() {
    let got = extract("(Official Video) [Lyrics]", Some("Channel"));
    assert_eq!(got, TrackQuery::default());
}

#[test]
fn raw_query_always_present_when_text_extractable() {
    for title in ["Just A Title", "A - B", "X by Y"] {
        let got = extract(title, None);
        assert!(got.raw_query.is_some(), "title: {title}");
    }
}
