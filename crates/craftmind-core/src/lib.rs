//! CraftMind Core - the agent's behavioral core.
//!
//! This crate provides:
//! - Bounded contextual memory (recent bot actions + per-player chat
//!   history with TTL eviction)
//! - Idle-prevention movement scheduling and stuck detection
//! - The conversation engine (reactive chat replies + proactive remarks)
//! - The session lifecycle manager (reconnect policy, idle-ban detection,
//!   identity rotation)
//!
//! Protocol handling, world state and the text-generation backend live
//! behind the `craftmind-traits` seams; this crate only coordinates them.

pub mod config;
pub mod conversation;
pub mod identity;
pub mod idle;
pub mod lifecycle;
pub mod memory;
pub mod stuck;

pub use config::{AgentConfig, ChatConfig, IdentityConfig, MemoryConfig, MovementConfig,
    ReconnectConfig, ServerConfig};
pub use conversation::{ConversationEngine, FALLBACK_REPLY};
pub use identity::{RotationPolicy, SessionIdentity, is_idle_ban};
pub use idle::IdlePreventionScheduler;
pub use lifecycle::SessionLifecycleManager;
pub use memory::{ActionMemory, PlayerMemory, SharedActionMemory, SharedPlayerMemory};
pub use stuck::{StuckDetector, StuckDetectorConfig};
