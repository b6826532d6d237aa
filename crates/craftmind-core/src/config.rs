//! Agent configuration.
//!
//! Loaded from an optional TOML file with environment-variable overrides
//! for the deployment-specific fields. Every behavioral knob has a serde
//! default so a missing file still yields a runnable (offline) agent.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::identity::RotationPolicy;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol_version: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            protocol_version: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub rotation_policy: RotationPolicy,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: None,
            rotation_policy: RotationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AiConfig {
    /// Absent key disables generation; deterministic replies remain.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// How often the proactive path checks whether to speak.
    #[serde(default = "default_proactive_check_secs")]
    pub proactive_check_secs: u64,
    /// Minimum silence before an unprompted remark when others are around.
    #[serde(default = "default_proactive_with_players_secs")]
    pub proactive_with_players_secs: u64,
    /// Minimum silence when alone (shorter; nobody is being interrupted).
    #[serde(default = "default_proactive_alone_secs")]
    pub proactive_alone_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            proactive_check_secs: default_proactive_check_secs(),
            proactive_with_players_secs: default_proactive_with_players_secs(),
            proactive_alone_secs: default_proactive_alone_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
    #[serde(default = "default_max_player_messages")]
    pub max_player_messages: usize,
    #[serde(default = "default_player_ttl_secs")]
    pub player_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            max_player_messages: default_max_player_messages(),
            player_ttl_secs: default_player_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    #[serde(default = "default_idle_tick_secs")]
    pub idle_tick_secs: u64,
    #[serde(default = "default_stuck_epsilon")]
    pub stuck_epsilon: f64,
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            idle_tick_secs: default_idle_tick_secs(),
            stuck_epsilon: default_stuck_epsilon(),
            stuck_threshold: default_stuck_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_kick_delay_secs")]
    pub kick_delay_secs: u64,
    #[serde(default = "default_error_delay_secs")]
    pub error_delay_secs: u64,
    #[serde(default = "default_end_delay_secs")]
    pub end_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            kick_delay_secs: default_kick_delay_secs(),
            error_delay_secs: default_error_delay_secs(),
            end_delay_secs: default_end_delay_secs(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    25565
}

fn default_username() -> String {
    "CraftMind".to_string()
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_proactive_check_secs() -> u64 {
    30
}

fn default_proactive_with_players_secs() -> u64 {
    10 * 60
}

fn default_proactive_alone_secs() -> u64 {
    3 * 60
}

fn default_max_actions() -> usize {
    3
}

fn default_max_player_messages() -> usize {
    3
}

fn default_player_ttl_secs() -> u64 {
    15 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_idle_tick_secs() -> u64 {
    7
}

fn default_stuck_epsilon() -> f64 {
    0.1
}

fn default_stuck_threshold() -> u32 {
    5
}

fn default_kick_delay_secs() -> u64 {
    30
}

fn default_error_delay_secs() -> u64 {
    60
}

fn default_end_delay_secs() -> u64 {
    30
}

impl AgentConfig {
    /// Load configuration: explicit path, else `CRAFTMIND_CONFIG`, else
    /// `craftmind.toml` in the working directory, else pure defaults.
    /// Environment variables override the deployment fields afterwards.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match Self::resolve_path(path) {
            Some(path) => {
                let contents = fs::read_to_string(&path).map_err(|err| {
                    anyhow::anyhow!("Failed to read config {}: {}", path.display(), err)
                })?;
                toml::from_str(&contents).map_err(|err| {
                    anyhow::anyhow!("Failed to parse config {}: {}", path.display(), err)
                })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<std::path::PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = env::var("CRAFTMIND_CONFIG") {
            return Some(path.into());
        }
        let local = Path::new("craftmind.toml");
        local.exists().then(|| local.to_path_buf())
    }

    fn apply_env(&mut self) {
        if let Ok(host) = env::var("CRAFTMIND_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env::var("CRAFTMIND_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(username) = env::var("CRAFTMIND_USERNAME") {
            self.identity.username = username;
        }
        if let Ok(password) = env::var("CRAFTMIND_PASSWORD") {
            self.identity.password = Some(password);
        }
        if let Ok(api_key) = env::var("CRAFTMIND_GEMINI_API_KEY") {
            self.ai.api_key = Some(api_key);
        }
    }

    pub fn player_ttl(&self) -> Duration {
        Duration::from_secs(self.memory.player_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.memory.sweep_interval_secs)
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_secs(self.movement.idle_tick_secs)
    }

    pub fn proactive_check(&self) -> Duration {
        Duration::from_secs(self.chat.proactive_check_secs)
    }

    pub fn proactive_with_players(&self) -> Duration {
        Duration::from_secs(self.chat.proactive_with_players_secs)
    }

    pub fn proactive_alone(&self) -> Duration {
        Duration::from_secs(self.chat.proactive_alone_secs)
    }

    pub fn kick_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect.kick_delay_secs)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect.error_delay_secs)
    }

    pub fn end_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect.end_delay_secs)
    }
}
