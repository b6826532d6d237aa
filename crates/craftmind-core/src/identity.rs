//! Login identity and idle-ban handling.
//!
//! Servers that idle-ban by username are worked around by rotating the
//! login name before the next connection attempt. Ordinary kicks and
//! errors never touch the identity; it lives for the whole process.

use rand::RngExt;
use rand::distr::Alphanumeric;
use serde::Deserialize;

/// How the login name mutates after an idle-ban kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// Append a monotonically increasing counter: `Suva`, `Suva2`, `Suva3`.
    /// Keeps rotated names recognizable.
    #[default]
    NumericSuffix,
    /// Append a fresh 4-char alphanumeric suffix each time: `SuvaX7q2`.
    /// For servers that pattern-match previously banned names.
    RandomSuffix,
}

/// The identity used for connection attempts.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    base_name: String,
    login_name: String,
    rotations: u32,
    policy: RotationPolicy,
}

impl SessionIdentity {
    pub fn new(base_name: impl Into<String>, policy: RotationPolicy) -> Self {
        let base_name = base_name.into();
        Self {
            login_name: base_name.clone(),
            base_name,
            rotations: 0,
            policy,
        }
    }

    /// The name to use for the next connection attempt.
    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn rotations(&self) -> u32 {
        self.rotations
    }

    /// Mutate the login name per the configured policy. Called only after
    /// a kick classified as an idle-ban.
    pub fn rotate(&mut self) {
        self.rotations += 1;
        self.login_name = match self.policy {
            RotationPolicy::NumericSuffix => {
                format!("{}{}", self.base_name, self.rotations + 1)
            }
            RotationPolicy::RandomSuffix => {
                let suffix: String = rand::rng()
                    .sample_iter(&Alphanumeric)
                    .take(4)
                    .map(char::from)
                    .collect();
                format!("{}{}", self.base_name, suffix)
            }
        };
    }
}

/// Classify a kick reason as an idle-ban.
///
/// Case-insensitive substring match: the reason must mention both "banned"
/// and "idle for too long". Anything else is an ordinary kick.
pub fn is_idle_ban(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    reason.contains("banned") && reason.contains("idle for too long")
}
