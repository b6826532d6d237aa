//! Game-session collaborator boundary.
//!
//! The agent never speaks the game protocol itself; it drives an opaque
//! session through [`GameSession`] and receives [`SessionEvent`]s over a
//! channel produced by a [`SessionConnector`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Session boundary error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("session is disconnected")]
    Disconnected,

    #[error("session action failed: {0}")]
    Action(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// World position of the bot's entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Movement controls the session exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementDirection {
    Forward,
    Back,
    Left,
    Right,
    Jump,
}

impl MovementDirection {
    /// Protocol-facing control name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::Forward => "forward",
            MovementDirection::Back => "back",
            MovementDirection::Left => "left",
            MovementDirection::Right => "right",
            MovementDirection::Jump => "jump",
        }
    }
}

/// Lifecycle and chat events emitted by a live session.
///
/// Events are delivered in arrival order on a single channel; the channel
/// closing is equivalent to an `Ended` event.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Login completed (connectors that resolve `connect` before the login
    /// handshake finishes emit this; others may omit it).
    Login,
    /// Inbound chat. `username` may be the bot itself; callers filter.
    Chat { username: String, message: String },
    /// Kicked by the server. `reason` has already been normalized to a
    /// plain string via [`normalize_kick_reason`].
    Kicked { reason: String, logged_in: bool },
    /// Transport or protocol error.
    Errored { message: String },
    /// Connection closed.
    Ended { reason: String },
}

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub protocol_version: Option<String>,
}

/// Handle to a live game session.
///
/// All mutating calls may fail once the underlying connection is gone;
/// callers that act on a timer must check [`GameSession::is_connected`]
/// first and treat failures as non-fatal.
#[async_trait]
pub trait GameSession: Send + Sync {
    /// Send a chat message.
    async fn chat(&self, text: &str) -> Result<()>;

    /// Engage or release a movement control.
    async fn set_movement_state(&self, direction: MovementDirection, engaged: bool) -> Result<()>;

    /// Point the bot's head. Angles in radians.
    async fn look(&self, yaw: f64, pitch: f64, force: bool) -> Result<()>;

    /// Current entity position, if the entity is spawned.
    fn position(&self) -> Option<Position>;

    /// Usernames of other players currently present (the bot itself is
    /// excluded).
    fn players_present(&self) -> Vec<String>;

    /// Last measured round-trip latency in milliseconds.
    fn latency_ms(&self) -> Option<u64>;

    /// Whether the connection is still live.
    fn is_connected(&self) -> bool;

    /// Disconnect gracefully with a reason.
    async fn quit(&self, reason: &str);
}

/// Factory for sessions. One successful call yields a session handle plus
/// the event stream for that connection.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<(Arc<dyn GameSession>, mpsc::Receiver<SessionEvent>)>;
}

/// Normalize a duck-typed kick payload into a single string.
///
/// Servers deliver kick reasons either as a bare string or as a structured
/// chat-component object. The contract: strings pass through unchanged;
/// objects contribute their `text` field followed by nested `extra` texts
/// in order; arrays concatenate their elements; anything else falls back to
/// compact JSON. Classification logic downstream only ever sees a string.
pub fn normalize_kick_reason(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => {
            let mut out = String::new();
            collect_component_text(raw, &mut out);
            if out.is_empty() { raw.to_string() } else { out }
        }
        other => other.to_string(),
    }
}

fn collect_component_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for item in items {
                collect_component_text(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(extra) = map.get("extra") {
                collect_component_text(extra, out);
            }
        }
        _ => {}
    }
}
