//! Console-backed session for local runs.
//!
//! Stands in for a real game connection: stdin lines become chat events,
//! outgoing chat prints to stdout, and movement nudges a simulated
//! position so the schedulers behave like they would in-world. Control
//! lines (`/quit`, `/kick`) simulate session endings for exercising the
//! reconnect and identity-rotation paths by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::info;

use craftmind_traits::{
    ConnectOptions, GameSession, MovementDirection, Position, SessionConnector, SessionError,
    SessionEvent, normalize_kick_reason,
};

/// The username chat lines fall under when none is given.
const CONSOLE_USER: &str = "Console";

pub struct ConsoleSession {
    username: String,
    connected: AtomicBool,
    position: Mutex<Position>,
}

impl ConsoleSession {
    fn new(username: String) -> Self {
        Self {
            username,
            connected: AtomicBool::new(true),
            position: Mutex::new(Position::new(0.0, 64.0, 0.0)),
        }
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl GameSession for ConsoleSession {
    async fn chat(&self, text: &str) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::Disconnected);
        }
        println!("<{}> {}", self.username, text);
        Ok(())
    }

    async fn set_movement_state(
        &self,
        direction: MovementDirection,
        engaged: bool,
    ) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::Disconnected);
        }
        if engaged {
            let mut position = self.position.lock();
            match direction {
                MovementDirection::Forward => position.x += 1.0,
                MovementDirection::Back => position.x -= 1.0,
                MovementDirection::Left => position.z -= 1.0,
                MovementDirection::Right => position.z += 1.0,
                MovementDirection::Jump => {}
            }
        }
        Ok(())
    }

    async fn look(&self, _yaw: f64, _pitch: f64, _force: bool) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::Disconnected);
        }
        Ok(())
    }

    fn position(&self) -> Option<Position> {
        Some(*self.position.lock())
    }

    fn players_present(&self) -> Vec<String> {
        // The person at the keyboard counts as present.
        if self.is_connected() {
            vec![CONSOLE_USER.to_string()]
        } else {
            vec![]
        }
    }

    fn latency_ms(&self) -> Option<u64> {
        Some(0)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn quit(&self, reason: &str) {
        if self.is_connected() {
            println!("<{}> disconnecting: {reason}", self.username);
        }
        self.disconnect();
    }
}

#[derive(Debug, PartialEq)]
enum ConsoleInput {
    Chat { username: String, message: String },
    Kick { reason: String },
    Quit,
    Empty,
}

/// `alice: hi` speaks as alice; a bare line speaks as the console user.
/// `/quit` ends the session; `/kick [reason]` simulates a server kick.
/// Kick reasons may be given as chat-component JSON, the way a real
/// server delivers them; they go through the same boundary normalization.
fn parse_console_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    if line == "/quit" {
        return ConsoleInput::Quit;
    }
    if let Some(rest) = line.strip_prefix("/kick") {
        let reason = rest.trim();
        let reason = if reason.is_empty() {
            "Kicked from console".to_string()
        } else {
            match serde_json::from_str::<serde_json::Value>(reason) {
                Ok(payload) => normalize_kick_reason(&payload),
                Err(_) => reason.to_string(),
            }
        };
        return ConsoleInput::Kick { reason };
    }
    if let Some((name, message)) = line.split_once(':') {
        let name = name.trim();
        let message = message.trim();
        if !name.is_empty() && !name.contains(' ') && !message.is_empty() {
            return ConsoleInput::Chat {
                username: name.to_string(),
                message: message.to_string(),
            };
        }
    }
    ConsoleInput::Chat {
        username: CONSOLE_USER.to_string(),
        message: line.to_string(),
    }
}

pub struct ConsoleConnector;

#[async_trait]
impl SessionConnector for ConsoleConnector {
    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<(Arc<dyn GameSession>, mpsc::Receiver<SessionEvent>), SessionError> {
        let session = Arc::new(ConsoleSession::new(options.username.clone()));
        let (tx, rx) = mpsc::channel(32);
        let _ = tx.send(SessionEvent::Login).await;
        info!(
            username = options.username,
            "console session open (type to chat, /quit to end, /kick to simulate a kick)"
        );

        let reader_session = session.clone();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_console_line(&line) {
                        ConsoleInput::Empty => continue,
                        ConsoleInput::Chat { username, message } => {
                            if tx
                                .send(SessionEvent::Chat { username, message })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        ConsoleInput::Kick { reason } => {
                            reader_session.disconnect();
                            let _ = tx
                                .send(SessionEvent::Kicked {
                                    reason,
                                    logged_in: true,
                                })
                                .await;
                            break;
                        }
                        ConsoleInput::Quit => {
                            reader_session.disconnect();
                            let _ = tx
                                .send(SessionEvent::Ended {
                                    reason: "console closed".to_string(),
                                })
                                .await;
                            break;
                        }
                    },
                    Ok(None) => {
                        reader_session.disconnect();
                        let _ = tx
                            .send(SessionEvent::Ended {
                                reason: "stdin closed".to_string(),
                            })
                            .await;
                        break;
                    }
                    Err(err) => {
                        reader_session.disconnect();
                        let _ = tx
                            .send(SessionEvent::Errored {
                                message: err.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        Ok((session, rx))
    }
}
