//! DaemonCore — single-owner event loop for all mutable daemon status.
//!
//! All inputs (socket commands, HTTP requests, completion notices from
//! spawned resolution tasks) funnel into this loop over one mpsc channel;
//! only the loop mutates the status snapshot.  Each resolution runs as its
//! own task so a slow search or an interactive authorization wait cannot
//! stall the loop.  Stale completions are harmless: a result is only ever
//! used to report one URL.

use std::sync::Arc;

use spotlink_proto::config::Config;
use spotlink_proto::protocol::Command;
use spotlink_proto::query::TrackQuery;
use spotlink_proto::status::StatusManager;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{error, info, warn};

use crate::auth::TokenStore;
use crate::spotify::{search_fallback_url, SpotifyClient};
use crate::BroadcastMessage;

// ── DaemonEvent ───────────────────────────────────────────────────────────────

/// All inputs into the DaemonCore loop.
#[derive(Debug)]
pub enum DaemonEvent {
    /// A command from a socket client.
    ClientCommand(Command),
    /// A resolution request from the HTTP API, answered over a oneshot.
    HttpResolve {
        query: TrackQuery,
        reply: oneshot::Sender<ResolveOutcome>,
    },
    /// A spawned resolution task finished.
    ResolutionDone(ResolveOutcome),
    /// A spawned authorization task finished.
    AuthDone { authorized: bool, message: Option<String> },
    /// Shutdown requested (Ctrl-C).
    Shutdown,
}

/// The URL produced for one request.  Every request produces an openable
/// URL; `fallback` marks the generic search page.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub url: String,
    pub fallback: bool,
}

// ── DaemonCore ────────────────────────────────────────────────────────────────

pub struct DaemonCore {
    status_manager: Arc<StatusManager>,
    spotify: Arc<SpotifyClient>,
    tokens: Arc<TokenStore>,
    event_tx: mpsc::Sender<DaemonEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl DaemonCore {
    pub async fn new(
        config: Config,
        http: reqwest::Client,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<DaemonEvent>,
    ) -> anyhow::Result<Self> {
        let status_manager = Arc::new(StatusManager::new(config.daemon.status_file.clone()));
        let tokens = TokenStore::from_config(&config, http.clone());
        let spotify = Arc::new(SpotifyClient::new(
            http,
            config.spotify.api_url.clone(),
            Arc::clone(&tokens),
        ));

        // Seed the auth fields from whatever credential survived restart.
        let (authorized, expires_at) = tokens.auth_state().await;
        status_manager.set_auth(authorized, expires_at).await;

        Ok(Self {
            status_manager,
            spotify,
            tokens,
            event_tx,
            broadcast_tx,
        })
    }

    /// Borrow the status manager (for the socket and HTTP servers).
    pub fn status_manager(&self) -> Arc<StatusManager> {
        Arc::clone(&self.status_manager)
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or the event channel is closed.
    pub async fn run(self, mut event_rx: mpsc::Receiver<DaemonEvent>) -> anyhow::Result<()> {
        info!("DaemonCore: starting event loop");

        loop {
            let evt = event_rx.recv().await;
            match evt {
                None => {
                    info!("DaemonCore: event channel closed, shutting down");
                    break;
                }

                Some(DaemonEvent::Shutdown) => {
                    info!("DaemonCore: shutdown requested");
                    break;
                }

                Some(DaemonEvent::ClientCommand(cmd)) => {
                    info!("DaemonCore: command {:?}", cmd);
                    if let Err(e) = self.handle_command(cmd).await {
                        error!("DaemonCore: command error: {}", e);
                    }
                }

                Some(DaemonEvent::HttpResolve { query, reply }) => {
                    self.spawn_resolution(query, Some(reply));
                }

                Some(DaemonEvent::ResolutionDone(outcome)) => {
                    self.record_outcome(&outcome).await;
                    let _ = self
                        .broadcast_tx
                        .send(BroadcastMessage::Resolved(outcome));
                    let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
                }

                Some(DaemonEvent::AuthDone {
                    authorized,
                    message,
                }) => {
                    let (has_cred, expires_at) = self.tokens.auth_state().await;
                    self.status_manager.set_auth(has_cred, expires_at).await;
                    let _ = self.broadcast_tx.send(BroadcastMessage::AuthState {
                        authorized,
                        message,
                    });
                    let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
                }
            }
        }

        Ok(())
    }

    // ── command handlers ──────────────────────────────────────────────────────

    async fn handle_command(&self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::OpenSpotifyForTitle { payload } => {
                self.spawn_resolution(payload, None);
            }
            Command::GetStatus => {
                let (authorized, expires_at) = self.tokens.auth_state().await;
                self.status_manager.set_auth(authorized, expires_at).await;
                let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
            }
            Command::Authorize => {
                let tokens = Arc::clone(&self.tokens);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let token = tokens.get_token(true).await;
                    let authorized = token.is_some();
                    let message = if authorized {
                        None
                    } else {
                        Some("authorization did not produce a token".to_string())
                    };
                    let _ = event_tx
                        .send(DaemonEvent::AuthDone {
                            authorized,
                            message,
                        })
                        .await;
                });
            }
        }
        Ok(())
    }

    /// Resolve on a dedicated task; the outcome returns to the loop as an
    /// event (and over the oneshot for HTTP callers).
    fn spawn_resolution(&self, query: TrackQuery, reply: Option<oneshot::Sender<ResolveOutcome>>) {
        let spotify = Arc::clone(&self.spotify);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = run_resolution(&spotify, &query).await;
            if let Some(reply) = reply {
                // HTTP caller may have gone away; the loop still records it.
                let _ = reply.send(outcome.clone());
            }
            let _ = event_tx.send(DaemonEvent::ResolutionDone(outcome)).await;
        });
    }

    async fn record_outcome(&self, outcome: &ResolveOutcome) {
        if let Err(e) = self
            .status_manager
            .record_resolution(&outcome.url, outcome.fallback)
            .await
        {
            warn!("Failed to persist resolution counters: {}", e);
        }
    }
}

/// Run one resolution.  The resolver's `None` always becomes the search-page
/// fallback so every request yields an openable URL.
pub async fn run_resolution(spotify: &SpotifyClient, query: &TrackQuery) -> ResolveOutcome {
    match spotify.resolve(query).await {
        Some(url) => {
            info!("Resolved to exact track: {}", url);
            ResolveOutcome {
                url,
                fallback: false,
            }
        }
        None => {
            let url = search_fallback_url(query.raw_query.as_deref().unwrap_or(""));
            info!("No confident match, falling back to search page");
            ResolveOutcome {
                url,
                fallback: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn shutdown_event_stops_the_loop() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.daemon.status_file = dir.path().join("status.json");

        let (broadcast_tx, _) = broadcast::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        let core = DaemonCore::new(
            config,
            reqwest::Client::new(),
            broadcast_tx,
            event_tx.clone(),
        )
        .await
        .unwrap();

        let handle = tokio::spawn(core.run(event_rx));
        event_tx.send(DaemonEvent::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }
}
