//! Local HTTP API with permissive CORS, so a page script on the watch page
//! can call the daemon directly via `fetch` against 127.0.0.1.

use crate::core::{DaemonEvent, ResolveOutcome};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use spotlink_proto::status::StatusManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    status_manager: Arc<StatusManager>,
    event_tx: mpsc::Sender<DaemonEvent>,
}

#[derive(Deserialize)]
struct ResolveParams {
    title: String,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Serialize)]
struct ResolveResponse {
    url: String,
    fallback: bool,
}

pub fn start_server(
    bind_address: String,
    port: u16,
    status_manager: Arc<StatusManager>,
    event_tx: mpsc::Sender<DaemonEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app_state = HttpState {
            status_manager,
            event_tx,
        };

        let app = Router::new()
            .route("/api/status", get(get_status))
            .route("/api/resolve", get(resolve_get).post(resolve_post))
            .layer(CorsLayer::permissive())
            .with_state(app_state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_status(
    State(state): State<HttpState>,
) -> Json<spotlink_proto::protocol::DaemonStatus> {
    Json(state.status_manager.get_status().await)
}

async fn resolve_get(
    State(state): State<HttpState>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<ResolveResponse>, StatusCode> {
    do_resolve(state, params).await
}

async fn resolve_post(
    State(state): State<HttpState>,
    Json(params): Json<ResolveParams>,
) -> Result<Json<ResolveResponse>, StatusCode> {
    do_resolve(state, params).await
}

async fn do_resolve(
    state: HttpState,
    params: ResolveParams,
) -> Result<Json<ResolveResponse>, StatusCode> {
    info!("HTTP API: resolve title {:?}", params.title);
    let query = spotlink_proto::query::extract(&params.title, params.channel.as_deref());

    let (reply_tx, reply_rx) = oneshot::channel::<ResolveOutcome>();
    if state
        .event_tx
        .send(DaemonEvent::HttpResolve {
            query,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to send resolve request to core");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    match reply_rx.await {
        Ok(outcome) => Ok(Json(ResolveResponse {
            url: outcome.url,
            fallback: outcome.fallback,
        })),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
