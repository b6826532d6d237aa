//! CraftMind Traits - Shared trait definitions and boundary types.
//!
//! This crate provides the seams between the agent core and its external
//! collaborators:
//! - `GameSession` / `SessionConnector`: the game-protocol client boundary
//! - `TextGenerator`: the text-generation boundary
//! - `RecipeLookup`: static game-data recipe formatting
//! - Kick-reason normalization for duck-typed disconnect payloads

pub mod generate;
pub mod recipe;
pub mod session;

pub use generate::{GenerateError, TextGenerator};
pub use recipe::RecipeLookup;
pub use session::{
    ConnectOptions, GameSession, MovementDirection, Position, SessionConnector, SessionError,
    SessionEvent, normalize_kick_reason,
};
