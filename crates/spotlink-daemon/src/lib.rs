pub mod auth;
pub mod core;
pub mod http;
pub mod socket;
pub mod spotify;

/// Fan-out from the core loop to every connected socket client.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    StateUpdated,
    Resolved(core::ResolveOutcome),
    AuthState {
        authorized: bool,
        message: Option<String>,
    },
    Log(String),
}
