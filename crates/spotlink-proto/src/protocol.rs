use serde::{Deserialize, Serialize};

use crate::query::TrackQuery;

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.  Clients check this on connect and can refuse to talk to an
/// incompatible daemon.
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent from clients to the daemon.
///
/// Tagged by a `"type"` field in SCREAMING_SNAKE_CASE so the resolution
/// request keeps its original inbound form:
/// `{ "type": "OPEN_SPOTIFY_FOR_TITLE", "payload": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Resolve a track query and answer with a `Resolved` broadcast.
    OpenSpotifyForTitle { payload: TrackQuery },
    GetStatus,
    /// Kick off the interactive authorization flow ahead of need.
    Authorize,
}

/// Messages sent from the daemon to clients (broadcasts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: daemon version + full status snapshot.
    Hello {
        protocol_version: u32,
        daemon_rev: u64,
        status: DaemonStatus,
    },
    State {
        data: DaemonStatus,
    },
    /// Outcome of one resolution request.  `fallback` is true when the URL is
    /// the generic search page rather than an exact track link.
    Resolved {
        url: String,
        fallback: bool,
    },
    /// Outcome of an interactive authorization attempt.
    AuthState {
        authorized: bool,
        message: Option<String>,
    },
    Log {
        message: String,
    },
}

/// Status snapshot of the daemon.  `rev` is a monotonically increasing
/// counter incremented every time the status changes.  Clients can use it to
/// detect missed updates and request a resync.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaemonStatus {
    /// Monotonic revision counter — incremented on every status change.
    #[serde(default)]
    pub rev: u64,
    /// True when a credential record exists, regardless of freshness.
    pub authorized: bool,
    /// Expiry of the stored access token (epoch seconds), when one exists.
    pub token_expires_at: Option<i64>,
    /// Resolutions that produced an exact track link.
    pub resolved_count: u64,
    /// Resolutions that degraded to the generic search page.
    pub fallback_count: u64,
    pub last_url: Option<String>,
    pub last_resolved_at: Option<i64>,
}

/// Wrapper for socket communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = json.len() as u32;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<(Self, usize)> {
        if data.len() < 4 {
            anyhow::bail!("Insufficient data for length header");
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if data.len() < 4 + len {
            anyhow::bail!("Insufficient data for message");
        }
        let msg: Self = serde_json::from_slice(&data[4..4 + len])?;
        Ok((msg, 4 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_encode_decode() {
        let msg = Message::Command(Command::OpenSpotifyForTitle {
            payload: TrackQuery {
                track: Some("Track".into()),
                artist: Some("Artist".into()),
                raw_query: Some("Track Artist".into()),
            },
        });
        let encoded = msg.encode().unwrap();
        let (decoded, len) = Message::decode(&encoded).unwrap();
        assert_eq!(len, encoded.len());
        match decoded {
            Message::Command(Command::OpenSpotifyForTitle { payload }) => {
                assert_eq!(payload.track.as_deref(), Some("Track"));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_command_wire_tag() {
        let msg = Command::OpenSpotifyForTitle {
            payload: TrackQuery::default(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "OPEN_SPOTIFY_FOR_TITLE");
        assert!(json["payload"].is_object());

        let json = serde_json::to_value(Command::GetStatus).unwrap();
        assert_eq!(json["type"], "GET_STATUS");
    }

    #[test]
    fn test_hello_encode_decode() {
        let status = DaemonStatus {
            rev: 42,
            ..Default::default()
        };
        let msg = Message::Broadcast(Broadcast::Hello {
            protocol_version: PROTOCOL_VERSION,
            daemon_rev: 42,
            status,
        });
        let encoded = msg.encode().unwrap();
        let (decoded, _) = Message::decode(&encoded).unwrap();
        match decoded {
            Message::Broadcast(Broadcast::Hello {
                protocol_version,
                daemon_rev,
                ..
            }) => {
                assert_eq!(protocol_version, PROTOCOL_VERSION);
                assert_eq!(daemon_rev, 42);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_partial_frame_is_rejected() {
        let msg = Message::Broadcast(Broadcast::Log {
            message: "hello".into(),
        });
        let encoded = msg.encode().unwrap();
        assert!(Message::decode(&encoded[..encoded.len() - 1]).is_err());
        assert!(Message::decode(&encoded[..2]).is_err());
    }
}
