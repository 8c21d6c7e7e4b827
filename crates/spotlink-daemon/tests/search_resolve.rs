//! Match resolver against a mock catalog endpoint, plus the end-to-end
//! fallback behaviour the core applies when resolution comes back empty.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use spotlink_daemon::auth::{Credential, InteractiveAuthorizer, TokenStore};
use spotlink_daemon::core::run_resolution;
use spotlink_daemon::spotify::SpotifyClient;
use spotlink_proto::query::TrackQuery;

struct DecliningAuthorizer;

#[async_trait]
impl InteractiveAuthorizer for DecliningAuthorizer {
    async fn launch(&self, _authorize_url: &str) -> anyhow::Result<String> {
        anyhow::bail!("interactive flow not expected in this test")
    }
}

/// Client backed by a fresh stored credential, so no token traffic happens.
fn client_with_token(api_url: String, dir: &TempDir) -> SpotifyClient {
    let credential_file = dir.path().join("credential.json");
    let cred = Credential {
        access_token: "test-token".into(),
        refresh_token: None,
        expires_at: Utc::now().timestamp() + 600,
    };
    std::fs::write(&credential_file, serde_json::to_string(&cred).unwrap()).unwrap();

    let tokens = Arc::new(TokenStore::new(
        reqwest::Client::new(),
        "test-client-id".into(),
        "http://127.0.0.1:1".into(), // never contacted
        8898,
        credential_file,
        Box::new(DecliningAuthorizer),
    ));
    SpotifyClient::new(reqwest::Client::new(), api_url, tokens)
}

/// Client with no credential and no client id: token acquisition degrades to
/// `None` without ever invoking the authorizer.
fn client_without_token(api_url: String, dir: &TempDir) -> SpotifyClient {
    let tokens = Arc::new(TokenStore::new(
        reqwest::Client::new(),
        String::new(),
        "http://127.0.0.1:1".into(),
        8898,
        dir.path().join("credential.json"),
        Box::new(DecliningAuthorizer),
    ));
    SpotifyClient::new(reqwest::Client::new(), api_url, tokens)
}

fn full_query() -> TrackQuery {
    TrackQuery {
        track: Some("Song".into()),
        artist: Some("Artist".into()),
        raw_query: Some("Song Artist".into()),
    }
}

fn search_body(items: serde_json::Value) -> serde_json::Value {
    json!({ "tracks": { "items": items } })
}

#[tokio::test]
async fn field_qualified_search_and_exact_match_selection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("q", "track:\"Song\" artist:\"Artist\""))
        .and(query_param("type", "track"))
        .and(query_param("limit", "5"))
        .and(query_param("market", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(json!([
            { "id": "remix", "name": "Song (Remix)", "artists": [{ "name": "Artist" }] },
            { "id": "exact", "name": "Song", "artists": [{ "name": "Artist" }] }
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_with_token(server.uri(), &dir);

    let url = client.resolve(&full_query()).await;
    assert_eq!(
        url.as_deref(),
        Some("https://open.spotify.com/track/exact")
    );
}

#[tokio::test]
async fn missing_track_takes_first_candidate_unconditionally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("q", "some free text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(json!([
            { "id": "first", "name": "Whatever", "artists": [] },
            { "id": "second", "name": "Else", "artists": [] }
        ]))))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_with_token(server.uri(), &dir);

    let query = TrackQuery {
        track: None,
        artist: None,
        raw_query: Some("some free text".into()),
    };
    let url = client.resolve(&query).await;
    assert_eq!(
        url.as_deref(),
        Some("https://open.spotify.com/track/first")
    );
}

#[tokio::test]
async fn empty_candidate_list_degrades_to_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(json!([]))))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_with_token(server.uri(), &dir);

    assert_eq!(client.resolve(&full_query()).await, None);

    let outcome = run_resolution(&client, &full_query()).await;
    assert!(outcome.fallback);
    assert_eq!(outcome.url, "https://open.spotify.com/search/Song%20Artist");
}

#[tokio::test]
async fn non_success_status_degrades_to_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_with_token(server.uri(), &dir);

    assert_eq!(client.resolve(&full_query()).await, None);
}

#[tokio::test]
async fn no_credential_and_no_client_id_falls_back_without_searching() {
    let server = MockServer::start().await;
    // The search endpoint must not be hit without a token.
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(json!([]))))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_without_token(server.uri(), &dir);

    assert_eq!(client.resolve(&full_query()).await, None);

    let outcome = run_resolution(&client, &full_query()).await;
    assert!(outcome.fallback);
    assert_eq!(outcome.url, "https://open.spotify.com/search/Song%20Artist");
}

#[tokio::test]
async fn all_null_query_short_circuits_to_bare_search_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_with_token(server.uri(), &dir);

    let outcome = run_resolution(&client, &TrackQuery::default()).await;
    assert!(outcome.fallback);
    assert_eq!(outcome.url, "https://open.spotify.com/search/");
}

#[tokio::test]
async fn artist_bonus_selects_between_substring_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(json!([
            { "id": "wrong", "name": "Song (Remix)", "artists": [{ "name": "Somebody Else" }] },
            { "id": "right", "name": "Song (Live)", "artists": [{ "name": "Artist" }] }
        ]))))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_with_token(server.uri(), &dir);

    let url = client.resolve(&full_query()).await;
    assert_eq!(
        url.as_deref(),
        Some("https://open.spotify.com/track/right")
    );
}
