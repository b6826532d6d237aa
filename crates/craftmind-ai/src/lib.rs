//! CraftMind AI - text generation for the agent.
//!
//! This crate provides:
//! - A Gemini `generateContent` HTTP client implementing
//!   [`craftmind_traits::TextGenerator`]
//! - Bounded retry for retryable HTTP failures
//! - A scripted mock generator for tests

pub mod error;
pub mod mock;
pub mod retry;

mod gemini;

pub use error::{AiError, Result};
pub use gemini::{GeminiClient, GenerationOptions};
pub use mock::MockGenerator;
pub use retry::GenRetryConfig;
