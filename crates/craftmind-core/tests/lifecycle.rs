//! End-to-end lifecycle tests against a scripted connector.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use craftmind_core::{AgentConfig, SessionLifecycleManager};
use craftmind_traits::{
    ConnectOptions, GameSession, MovementDirection, Position, RecipeLookup, SessionConnector,
    SessionError, SessionEvent,
};

struct FakeSession {
    connected: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl FakeSession {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            sent: Mutex::new(vec![]),
        })
    }
}

#[async_trait]
impl GameSession for FakeSession {
    async fn chat(&self, text: &str) -> Result<(), SessionError> {
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    async fn set_movement_state(
        &self,
        _direction: MovementDirection,
        _engaged: bool,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn look(&self, _yaw: f64, _pitch: f64, _force: bool) -> Result<(), SessionError> {
        Ok(())
    }

    fn position(&self) -> Option<Position> {
        None
    }

    fn players_present(&self) -> Vec<String> {
        vec![]
    }

    fn latency_ms(&self) -> Option<u64> {
        Some(31)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn quit(&self, _reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Pops one event script per connection attempt. Scripts are delivered
/// up-front; an empty script keeps the event channel open so the session
/// only ends on shutdown.
struct ScriptedConnector {
    scripts: Mutex<Vec<Vec<SessionEvent>>>,
    usernames: Mutex<Vec<String>>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    open_senders: Mutex<Vec<mpsc::Sender<SessionEvent>>>,
}

impl ScriptedConnector {
    fn new(scripts: Vec<Vec<SessionEvent>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts),
            usernames: Mutex::new(vec![]),
            sessions: Mutex::new(vec![]),
            open_senders: Mutex::new(vec![]),
        })
    }

    fn connect_count(&self) -> usize {
        self.usernames.lock().len()
    }
}

#[async_trait]
impl SessionConnector for ScriptedConnector {
    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<(Arc<dyn GameSession>, mpsc::Receiver<SessionEvent>), SessionError> {
        self.usernames.lock().push(options.username.clone());
        let script = {
            let mut scripts = self.scripts.lock();
            if scripts.is_empty() { vec![] } else { scripts.remove(0) }
        };
        let keep_open = script.is_empty();
        let (tx, rx) = mpsc::channel(16);
        for event in script {
            tx.send(event).await.expect("scripted event fits buffer");
        }
        if keep_open {
            self.open_senders.lock().push(tx);
        }
        let session = FakeSession::new();
        self.sessions.lock().push(session.clone());
        Ok((session, rx))
    }
}

struct NoRecipes;

impl RecipeLookup for NoRecipes {
    fn lookup(&self, item_name: &str) -> String {
        format!("I don't have a recipe for {item_name}.")
    }
}

fn test_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.identity.username = "Suva".to_string();
    config
}

#[tokio::test(start_paused = true)]
async fn idle_ban_rotates_identity_but_ordinary_endings_do_not() {
    let connector = ScriptedConnector::new(vec![
        vec![SessionEvent::Kicked {
            reason: "You have been banned for idle for too long".to_string(),
            logged_in: true,
        }],
        vec![SessionEvent::Ended {
            reason: "server closed".to_string(),
        }],
        // Third connection stays open until shutdown.
        vec![],
    ]);
    let shutdown = CancellationToken::new();
    let manager = SessionLifecycleManager::new(
        connector.clone(),
        None,
        Arc::new(NoRecipes),
        test_config(),
        shutdown.clone(),
    );

    let handle = tokio::spawn(manager.run());
    while connector.connect_count() < 3 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let usernames = connector.usernames.lock();
    assert_eq!(
        usernames.as_slice(),
        &["Suva", "Suva2", "Suva2"],
        "idle-ban rotates, ordinary end does not"
    );

    // Each session greets with its own login name.
    let sessions = connector.sessions.lock();
    assert!(sessions[0].sent.lock()[0].starts_with("Suva is online!"));
    assert!(sessions[1].sent.lock()[0].starts_with("Suva2 is online!"));

    // Shutdown quit the live session gracefully.
    assert!(!sessions[2].is_connected());
}

#[tokio::test(start_paused = true)]
async fn chat_commands_are_answered_over_the_session() {
    let connector = ScriptedConnector::new(vec![vec![
        SessionEvent::Login,
        SessionEvent::Chat {
            username: "alice".to_string(),
            message: "!ping".to_string(),
        },
        // The bot's own messages echo back and must be ignored.
        SessionEvent::Chat {
            username: "Suva".to_string(),
            message: "!ping".to_string(),
        },
        SessionEvent::Ended {
            reason: "done".to_string(),
        },
    ]]);
    let shutdown = CancellationToken::new();
    let manager = SessionLifecycleManager::new(
        connector.clone(),
        None,
        Arc::new(NoRecipes),
        test_config(),
        shutdown.clone(),
    );

    let handle = tokio::spawn(manager.run());
    while connector.connect_count() < 2 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let sessions = connector.sessions.lock();
    let sent = sessions[0].sent.lock();
    assert!(sent[0].starts_with("Suva is online!"));
    assert_eq!(sent[1], "Pong, alice! My ping is currently 31ms.");
    assert_eq!(sent.len(), 2, "self-chat must not be answered");
}
