//! Deterministic mock generator for conversation and lifecycle tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use craftmind_traits::{GenerateError, TextGenerator};

/// Scripted [`TextGenerator`]: pops one queued step per call and counts
/// invocations so tests can assert a path never reached the generator.
///
/// With an empty script every call succeeds with a fixed marker string.
#[derive(Default)]
pub struct MockGenerator {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn push_text(&self, text: impl Into<String>) {
        self.script.lock().push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.script.lock().push_back(Err(message.into()));
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: &str,
    ) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        match self.script.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GenerateError::new(message)),
            None => Ok("mock completion".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_steps_pop_in_order() {
        let generator = MockGenerator::new();
        generator.push_text("first");
        generator.push_error("boom");

        assert_eq!(generator.generate("p1", "s").await.unwrap(), "first");
        assert!(generator.generate("p2", "s").await.is_err());
        assert_eq!(generator.generate("p3", "s").await.unwrap(), "mock completion");
        assert_eq!(generator.calls(), 3);
        assert_eq!(generator.prompts(), vec!["p1", "p2", "p3"]);
    }
}
