//! Per-player conversational memory.
//!
//! Each player gets a bounded FIFO of their recent messages. Entries
//! expire after a TTL; expiry is applied lazily whenever a record is read
//! and store-wide by the periodic sweep. A record that ends up empty is
//! removed entirely, so the store never holds empty shells for players
//! who left.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default number of messages retained per player.
pub const DEFAULT_MAX_MESSAGES: usize = 3;

/// Default entry TTL: 15 minutes of inactivity forgets the context.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct PlayerChatEntry {
    message: String,
    recorded_at: Instant,
}

#[derive(Debug, Clone, Default)]
struct PlayerRecord {
    history: Vec<PlayerChatEntry>,
}

/// Per-player bounded chat history with TTL eviction.
#[derive(Debug, Clone)]
pub struct PlayerMemory {
    records: HashMap<String, PlayerRecord>,
    max_messages: usize,
    ttl: Duration,
}

impl Default for PlayerMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_TTL)
    }
}

impl PlayerMemory {
    pub fn new(max_messages: usize, ttl: Duration) -> Self {
        Self {
            records: HashMap::new(),
            max_messages,
            ttl,
        }
    }

    /// Record a message from a player.
    pub fn record_message(&mut self, player: &str, message: impl Into<String>) {
        self.record_message_at(player, message, Instant::now());
    }

    /// Clock-parameterized variant of [`PlayerMemory::record_message`].
    pub fn record_message_at(&mut self, player: &str, message: impl Into<String>, now: Instant) {
        let record = self.records.entry(player.to_string()).or_default();
        record.history.push(PlayerChatEntry {
            message: message.into(),
            recorded_at: now,
        });
        let len = record.history.len();
        if len > self.max_messages {
            record.history.drain(..len - self.max_messages);
        }
    }

    /// Formatted context of the player's recent messages, oldest first.
    ///
    /// Mutating read: expired entries are excised first, and a record left
    /// empty is removed from the store, in which case `None` is returned.
    pub fn context(&mut self, player: &str) -> Option<String> {
        self.context_at(player, Instant::now())
    }

    /// Clock-parameterized variant of [`PlayerMemory::context`].
    pub fn context_at(&mut self, player: &str, now: Instant) -> Option<String> {
        let ttl = self.ttl;
        let record = self.records.get_mut(player)?;
        record
            .history
            .retain(|entry| now.duration_since(entry.recorded_at) < ttl);

        if record.history.is_empty() {
            self.records.remove(player);
            return None;
        }

        let messages: Vec<&str> = record
            .history
            .iter()
            .map(|entry| entry.message.as_str())
            .collect();
        Some(format!(
            "Our recent conversation involved you saying: \"{}\"",
            messages.join("; ")
        ))
    }

    /// Evict expired entries store-wide and drop emptied records.
    /// Returns the number of records removed.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Clock-parameterized variant of [`PlayerMemory::sweep`].
    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.records.len();
        self.records.retain(|_, record| {
            record
                .history
                .retain(|entry| now.duration_since(entry.recorded_at) < ttl);
            !record.history.is_empty()
        });
        before - self.records.len()
    }

    /// Drop every record. Called once per successful login.
    pub fn clear_all(&mut self) {
        self.records.clear();
    }

    /// Number of players currently tracked.
    pub fn player_count(&self) -> usize {
        self.records.len()
    }
}
