//! Session lifecycle: connect, supervise, reconnect.
//!
//! One manager owns the whole agent lifetime. Each successful connection
//! gets a fresh child cancellation token under which the idle scheduler,
//! stuck sampler, memory sweep and proactive chat run; when the session
//! dies for any reason the token is dropped, every per-session task stops,
//! and the manager sleeps a cause-specific delay before trying again.
//!
//! Kicks classified as idle-bans rotate the login identity before the next
//! attempt. The retry loop is unbounded; only process shutdown ends it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use craftmind_traits::{
    ConnectOptions, GameSession, RecipeLookup, SessionConnector, SessionEvent, TextGenerator,
};

use crate::config::AgentConfig;
use crate::conversation::{ConversationEngine, ProactiveConfig, spawn_proactive};
use crate::identity::{SessionIdentity, is_idle_ban};
use crate::idle::{IdlePreventionScheduler, spawn_stuck_sampler};
use crate::memory::{
    ActionMemory, PlayerMemory, SharedActionMemory, SharedPlayerMemory, spawn_sweep_task,
};
use crate::stuck::StuckDetectorConfig;

pub struct SessionLifecycleManager {
    connector: Arc<dyn SessionConnector>,
    engine: Arc<ConversationEngine>,
    config: AgentConfig,
    identity: SessionIdentity,
    actions: SharedActionMemory,
    players: SharedPlayerMemory,
    shutdown: CancellationToken,
}

impl SessionLifecycleManager {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        generator: Option<Arc<dyn TextGenerator>>,
        recipes: Arc<dyn RecipeLookup>,
        config: AgentConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let actions: SharedActionMemory = Arc::new(Mutex::new(ActionMemory::new(
            config.memory.max_actions,
        )));
        let players: SharedPlayerMemory = Arc::new(Mutex::new(PlayerMemory::new(
            config.memory.max_player_messages,
            config.player_ttl(),
        )));
        let engine = Arc::new(ConversationEngine::new(
            generator,
            recipes,
            actions.clone(),
            players.clone(),
            config.chat.prefix.clone(),
            config.identity.username.clone(),
        ));
        let identity = SessionIdentity::new(
            config.identity.username.clone(),
            config.identity.rotation_policy,
        );
        Self {
            connector,
            engine,
            config,
            identity,
            actions,
            players,
            shutdown,
        }
    }

    /// Current login name (rotates after idle-ban kicks).
    pub fn login_name(&self) -> &str {
        self.identity.login_name()
    }

    /// Run until shutdown. Never returns early on session failures.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }
            let options = ConnectOptions {
                host: self.config.server.host.clone(),
                port: self.config.server.port,
                username: self.identity.login_name().to_string(),
                password: self.config.identity.password.clone(),
                protocol_version: self.config.server.protocol_version.clone(),
            };
            info!(
                username = options.username,
                host = options.host,
                port = options.port,
                "connecting"
            );

            let delay = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                result = self.connector.connect(&options) => match result {
                    Ok((session, events)) => match self.run_session(session, events).await {
                        Some(delay) => delay,
                        None => return Ok(()),
                    },
                    Err(err) => {
                        warn!("connection attempt failed: {err}");
                        self.config.error_delay()
                    }
                },
            };

            info!(delay_secs = delay.as_secs(), "reconnecting after delay");
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Drive one live session to completion. Returns the reconnect delay,
    /// or `None` on shutdown.
    async fn run_session(
        &mut self,
        session: Arc<dyn GameSession>,
        mut events: mpsc::Receiver<SessionEvent>,
    ) -> Option<Duration> {
        // Stale context from a previous identity must not leak into this
        // session's prompts.
        self.actions.lock().clear();
        self.players.lock().clear_all();

        let session_token = self.shutdown.child_token();
        let _task_guard = session_token.clone().drop_guard();

        IdlePreventionScheduler::new(
            session.clone(),
            self.actions.clone(),
            session_token.clone(),
            self.config.idle_tick(),
        )
        .spawn();
        spawn_stuck_sampler(
            session.clone(),
            self.actions.clone(),
            StuckDetectorConfig {
                epsilon: self.config.movement.stuck_epsilon,
                still_threshold: self.config.movement.stuck_threshold,
            },
            session_token.clone(),
        );
        spawn_sweep_task(
            self.players.clone(),
            self.config.sweep_interval(),
            session_token.clone(),
        );
        if self.engine.has_generator() {
            spawn_proactive(
                self.engine.clone(),
                session.clone(),
                ProactiveConfig {
                    check_interval: self.config.proactive_check(),
                    with_players: self.config.proactive_with_players(),
                    alone: self.config.proactive_alone(),
                },
                session_token.clone(),
            );
        }

        let greeting = format!(
            "{} is online! Hello everyone! Type \"{} help\" for assistance.",
            self.identity.login_name(),
            self.config.chat.prefix
        );
        if let Err(err) = session.chat(&greeting).await {
            warn!("failed to send greeting: {err}");
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    session.quit("shutting down").await;
                    return None;
                }
                event = events.recv() => match event {
                    Some(SessionEvent::Login) => info!("login complete"),
                    Some(SessionEvent::Chat { username, message }) => {
                        if username == self.identity.login_name() {
                            continue;
                        }
                        debug!(username, message, "chat received");
                        if let Some(reply) = self
                            .engine
                            .handle_chat(&username, &message, session.latency_ms())
                            .await
                            && let Err(err) = session.chat(&reply).await
                        {
                            warn!("failed to send reply: {err}");
                        }
                    }
                    Some(SessionEvent::Kicked { reason, logged_in }) => {
                        warn!(reason, logged_in, "kicked from server");
                        if is_idle_ban(&reason) {
                            let previous = self.identity.login_name().to_string();
                            self.identity.rotate();
                            info!(
                                previous,
                                next = self.identity.login_name(),
                                "idle ban detected, rotating login name"
                            );
                        }
                        return Some(self.config.kick_delay());
                    }
                    Some(SessionEvent::Errored { message }) => {
                        warn!(message, "session error");
                        return Some(self.config.error_delay());
                    }
                    Some(SessionEvent::Ended { reason }) => {
                        info!(reason, "session ended");
                        return Some(self.config.end_delay());
                    }
                    // Channel closed without a terminal event: treat as end.
                    None => {
                        info!("session event stream closed");
                        return Some(self.config.end_delay());
                    }
                }
            }
        }
    }
}
