use crate::protocol::DaemonStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The durable subset of [`DaemonStatus`] — resolution counters survive
/// daemon restarts.  Auth fields are derived from the credential store at
/// startup instead of being persisted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentStatus {
    pub resolved_count: u64,
    pub fallback_count: u64,
}

pub struct StatusManager {
    status: Arc<RwLock<DaemonStatus>>,
    status_file: PathBuf,
}

impl StatusManager {
    pub fn new(status_file: PathBuf) -> Self {
        let persistent = Self::load_persistent(&status_file);

        let status = DaemonStatus {
            rev: 1,
            authorized: false,
            token_expires_at: None,
            resolved_count: persistent.resolved_count,
            fallback_count: persistent.fallback_count,
            last_url: None,
            last_resolved_at: None,
        };

        Self {
            status: Arc::new(RwLock::new(status)),
            status_file,
        }
    }

    pub async fn get_status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }

    /// Update the auth fields of the snapshot.  Not persisted — the
    /// credential store is the source of truth across restarts.
    pub async fn set_auth(&self, authorized: bool, token_expires_at: Option<i64>) {
        let mut status = self.status.write().await;
        status.authorized = authorized;
        status.token_expires_at = token_expires_at;
        status.rev += 1;
    }

    /// Record one completed resolution and persist the counters.
    pub async fn record_resolution(&self, url: &str, fallback: bool) -> anyhow::Result<()> {
        {
            let mut status = self.status.write().await;
            if fallback {
                status.fallback_count += 1;
            } else {
                status.resolved_count += 1;
            }
            status.last_url = Some(url.to_string());
            status.last_resolved_at = Some(chrono::Utc::now().timestamp());
            status.rev += 1;
        }
        self.save().await
    }

    async fn save(&self) -> anyhow::Result<()> {
        let status = self.status.read().await;
        let persistent = PersistentStatus {
            resolved_count: status.resolved_count,
            fallback_count: status.fallback_count,
        };

        if let Some(parent) = self.status_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&persistent)?;
        tokio::fs::write(&self.status_file, json).await?;
        Ok(())
    }

    fn load_persistent(status_file: &PathBuf) -> PersistentStatus {
        if let Ok(content) = std::fs::read_to_string(status_file) {
            if let Ok(persistent) = serde_json::from_str::<PersistentStatus>(&content) {
                return persistent;
            }
        }
        PersistentStatus::default()
    }
}
