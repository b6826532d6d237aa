//! Recent bot-action memory.
//!
//! A bounded FIFO of short action labels ("jumping", "strafing left").
//! The conversation engine folds the summary into generation prompts so
//! the bot can comment on what it has just been doing.

use std::collections::VecDeque;

/// Default number of action labels retained.
pub const DEFAULT_MAX_ACTIONS: usize = 3;

const SUMMARY_PREFIX: &str = "involved in activities such as: ";

/// Bounded FIFO of recent action labels, oldest first.
#[derive(Debug, Clone)]
pub struct ActionMemory {
    entries: VecDeque<String>,
    max_entries: usize,
}

impl Default for ActionMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIONS)
    }
}

impl ActionMemory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
        }
    }

    /// Record an action label, evicting the oldest past capacity.
    pub fn record(&mut self, label: impl Into<String>) {
        self.entries.push_back(label.into());
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// Human-readable summary of the retained labels, oldest first.
    /// `None` when nothing has been recorded.
    pub fn summary(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let labels: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        Some(format!("{}{}", SUMMARY_PREFIX, labels.join(", ")))
    }

    /// Drop everything. Called once per successful login.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
