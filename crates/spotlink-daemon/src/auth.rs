//! OAuth token lifecycle: one credential slot, cached in memory and mirrored
//! to disk, refreshed proactively, escalated to an interactive PKCE flow when
//! silent renewal is no longer possible.
//!
//! `get_token` never fails to its caller — every internal error is logged and
//! degrades to `None`, leaving the resolver to fall back to the generic
//! search page.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use axum::{extract::RawQuery, response::Html, routing::get, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use spotlink_proto::config::Config;

/// Renew this many seconds before true expiry — absorbs clock skew and
/// in-flight request latency so a token is never presented already expired.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Bounded wait for the interactive redirect before giving up.
const INTERACTIVE_WAIT: Duration = Duration::from_secs(300);

const PKCE_VERIFIER_LEN: usize = 64;
const OAUTH_STATE_LEN: usize = 16;

// ── Credential ────────────────────────────────────────────────────────────────

/// The one stored credential record.  Persisted as JSON under the data
/// directory; at most one exists per installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Epoch seconds, with the proactive margin already subtracted.
    pub expires_at: i64,
}

impl Credential {
    fn is_fresh(&self, now: i64) -> bool {
        !self.access_token.is_empty() && now < self.expires_at
    }

    fn from_response(resp: TokenResponse, prior_refresh: Option<String>) -> Self {
        Self {
            access_token: resp.access_token,
            // The provider may omit the refresh token on rotation — retain
            // the prior one in that case.
            refresh_token: resp.refresh_token.or(prior_refresh),
            expires_at: Utc::now().timestamp() + resp.expires_in - TOKEN_EXPIRY_MARGIN_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

// ── Error taxonomy ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no client id configured")]
    NotConfigured,
    #[error("token endpoint returned {0}")]
    Endpoint(reqwest::StatusCode),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authorization declined: {0}")]
    Declined(String),
    #[error("state parameter mismatch in redirect")]
    StateMismatch,
    #[error("redirect carried no authorization code")]
    NoCode,
}

// ── InteractiveAuthorizer ─────────────────────────────────────────────────────

/// Capability to run the browser-delegated half of the interactive flow:
/// open the authorize URL, capture the redirect, return its full URL.
/// Injected so the token logic is host-independent and mockable in tests.
#[async_trait]
pub trait InteractiveAuthorizer: Send + Sync {
    async fn launch(&self, authorize_url: &str) -> anyhow::Result<String>;
}

/// Production authorizer: binds a loopback listener for the `/callback`
/// redirect, opens the system browser, and resolves with whatever redirect
/// arrives first (bounded wait).
pub struct BrowserAuthorizer {
    pub bind_address: String,
    pub port: u16,
}

#[async_trait]
impl InteractiveAuthorizer for BrowserAuthorizer {
    async fn launch(&self, authorize_url: &str) -> anyhow::Result<String> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind authorization callback on {}", addr))?;

        let (redirect_tx, mut redirect_rx) = tokio::sync::mpsc::channel::<String>(1);
        let callback_base = format!("http://{}/callback", addr);

        let app = Router::new().route(
            "/callback",
            get(move |RawQuery(query): RawQuery| {
                let tx = redirect_tx.clone();
                let base = callback_base.clone();
                async move {
                    let full = match query {
                        Some(q) => format!("{}?{}", base, q),
                        None => base,
                    };
                    let _ = tx.send(full).await;
                    Html("<p>Authorization received — you can close this tab.</p>")
                }
            }),
        );

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        if let Err(e) = webbrowser::open(authorize_url) {
            warn!("Could not open browser ({}); open this URL manually:", e);
            info!("{}", authorize_url);
        }

        let redirect = tokio::time::timeout(INTERACTIVE_WAIT, redirect_rx.recv()).await;
        server.abort();

        match redirect {
            Ok(Some(url)) => Ok(url),
            Ok(None) => anyhow::bail!("authorization callback closed without a redirect"),
            Err(_) => anyhow::bail!(
                "no authorization redirect within {}s",
                INTERACTIVE_WAIT.as_secs()
            ),
        }
    }
}

// ── TokenStore ────────────────────────────────────────────────────────────────

/// Single-writer owner of the credential slot.
///
/// Fast path takes the read lock only; any path that might exchange over the
/// network takes the write lock and double-checks first, so overlapping
/// callers serialize on one refresh and the second sees the fresh credential.
pub struct TokenStore {
    http: reqwest::Client,
    client_id: String,
    accounts_url: String,
    redirect_port: u16,
    credential_file: PathBuf,
    slot: RwLock<Option<Credential>>,
    authorizer: Box<dyn InteractiveAuthorizer>,
}

impl TokenStore {
    pub fn new(
        http: reqwest::Client,
        client_id: String,
        accounts_url: String,
        redirect_port: u16,
        credential_file: PathBuf,
        authorizer: Box<dyn InteractiveAuthorizer>,
    ) -> Self {
        let stored = Self::load_credential(&credential_file);
        if stored.is_some() {
            debug!("Loaded stored credential from {:?}", credential_file);
        }
        Self {
            http,
            client_id,
            accounts_url,
            redirect_port,
            credential_file,
            slot: RwLock::new(stored),
            authorizer,
        }
    }

    pub fn from_config(config: &Config, http: reqwest::Client) -> Arc<Self> {
        let authorizer = BrowserAuthorizer {
            bind_address: "127.0.0.1".to_string(),
            port: config.spotify.redirect_port,
        };
        Arc::new(Self::new(
            http,
            config.spotify.client_id.clone(),
            config.spotify.accounts_url.clone(),
            config.spotify.redirect_port,
            config.credential_file(),
            Box::new(authorizer),
        ))
    }

    /// Get a valid access token.  `interactive` allows escalation to the
    /// browser-delegated flow when silent renewal fails.  Never errors:
    /// internal failures are logged and degrade to `None`.
    pub async fn get_token(&self, interactive: bool) -> Option<String> {
        // Fast path: no network I/O beyond the local read.
        {
            let slot = self.slot.read().await;
            if let Some(cred) = slot.as_ref() {
                if cred.is_fresh(Utc::now().timestamp()) {
                    return Some(cred.access_token.clone());
                }
            }
        }

        let mut slot = self.slot.write().await;

        // Double-check: another caller may have refreshed while we waited.
        if let Some(cred) = slot.as_ref() {
            if cred.is_fresh(Utc::now().timestamp()) {
                return Some(cred.access_token.clone());
            }
        }

        // Silent renewal.
        if let Some(refresh) = slot.as_ref().and_then(|c| c.refresh_token.clone()) {
            match self.refresh_exchange(&refresh).await {
                Ok(resp) => {
                    let cred = Credential::from_response(resp, Some(refresh));
                    self.persist(&cred).await;
                    let token = cred.access_token.clone();
                    *slot = Some(cred);
                    info!("Access token refreshed silently");
                    return Some(token);
                }
                Err(e) => warn!("Silent token refresh failed: {}", e),
            }
        }

        if !interactive {
            return None;
        }

        // One escalation to interactive re-authorization.
        match self.interactive_exchange().await {
            Ok(cred) => {
                self.persist(&cred).await;
                let token = cred.access_token.clone();
                *slot = Some(cred);
                info!("Interactive authorization completed");
                Some(token)
            }
            Err(e) => {
                warn!("Interactive authorization failed: {}", e);
                None
            }
        }
    }

    /// Snapshot for status reporting: (credential exists, its expiry).
    pub async fn auth_state(&self) -> (bool, Option<i64>) {
        let slot = self.slot.read().await;
        (slot.is_some(), slot.as_ref().map(|c| c.expires_at))
    }

    /// Current credential record (read-only copy).
    pub async fn credential(&self) -> Option<Credential> {
        self.slot.read().await.clone()
    }

    // ── exchanges ─────────────────────────────────────────────────────────────

    async fn refresh_exchange(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::NotConfigured);
        }
        let resp = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::Endpoint(resp.status()));
        }
        Ok(resp.json().await?)
    }

    async fn interactive_exchange(&self) -> Result<Credential, AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::NotConfigured);
        }

        let verifier = random_token(PKCE_VERIFIER_LEN);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        let state = random_token(OAUTH_STATE_LEN);
        let redirect_uri = format!("http://127.0.0.1:{}/callback", self.redirect_port);

        let authorize_url = format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&code_challenge_method=S256&code_challenge={}&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            challenge,
            state,
        );

        let redirect = self
            .authorizer
            .launch(&authorize_url)
            .await
            .map_err(|e| AuthError::Declined(e.to_string()))?;

        let params = parse_query_params(&redirect);
        if let Some(err) = params.get("error") {
            return Err(AuthError::Declined(err.clone()));
        }
        if params.get("state").map(String::as_str) != Some(state.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        let code = params.get("code").ok_or(AuthError::NoCode)?;

        let resp = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &redirect_uri),
                ("client_id", &self.client_id),
                ("code_verifier", &verifier),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::Endpoint(resp.status()));
        }
        let token: TokenResponse = resp.json().await?;
        Ok(Credential::from_response(token, None))
    }

    // ── persistence ───────────────────────────────────────────────────────────

    /// Write the credential to disk before the in-memory slot is replaced.
    /// A write failure is logged but does not discard the fresh token.
    async fn persist(&self, cred: &Credential) {
        if let Err(e) = self.try_persist(cred).await {
            warn!("Failed to persist credential: {}", e);
        }
    }

    async fn try_persist(&self, cred: &Credential) -> anyhow::Result<()> {
        if let Some(parent) = self.credential_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(cred)?;
        tokio::fs::write(&self.credential_file, json).await?;
        Ok(())
    }

    fn load_credential(credential_file: &PathBuf) -> Option<Credential> {
        let content = std::fs::read_to_string(credential_file).ok()?;
        serde_json::from_str(&content).ok()
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn parse_query_params(url: &str) -> HashMap<String, String> {
    let query = match url.split_once('?') {
        Some((_, q)) => q,
        None => return HashMap::new(),
    };
    query
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = urlencoding::decode(k).ok()?.into_owned();
            let v = urlencoding::decode(v).ok()?.into_owned();
            Some((k, v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_challenge_is_base64url_sha256() {
        // RFC 7636 appendix B reference pair.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn random_tokens_are_alphanumeric_and_sized() {
        let v = random_token(PKCE_VERIFIER_LEN);
        assert_eq!(v.len(), PKCE_VERIFIER_LEN);
        assert!(v.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(random_token(OAUTH_STATE_LEN), random_token(OAUTH_STATE_LEN));
    }

    #[test]
    fn parses_redirect_query_params() {
        let params =
            parse_query_params("http://127.0.0.1:8898/callback?code=abc%20def&state=xyz");
        assert_eq!(params.get("code").map(String::as_str), Some("abc def"));
        assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
        assert!(parse_query_params("http://127.0.0.1:8898/callback").is_empty());
    }

    #[test]
    fn credential_freshness_uses_margin_baked_expiry() {
        let now = Utc::now().timestamp();
        let fresh = Credential {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: now + 120,
        };
        let stale = Credential {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: now - 1,
        };
        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
    }

    #[test]
    fn refresh_token_retained_when_not_rotated() {
        let resp = TokenResponse {
            access_token: "new".into(),
            expires_in: 3600,
            refresh_token: None,
        };
        let cred = Credential::from_response(resp, Some("prior".into()));
        assert_eq!(cred.refresh_token.as_deref(), Some("prior"));

        let resp = TokenResponse {
            access_token: "new".into(),
            expires_in: 3600,
            refresh_token: Some("rotated".into()),
        };
        let cred = Credential::from_response(resp, Some("prior".into()));
        assert_eq!(cred.refresh_token.as_deref(), Some("rotated"));
    }
}
