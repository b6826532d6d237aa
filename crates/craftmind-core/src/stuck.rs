//! Stuck detection over position samples.
//!
//! The agent is declared immobile when its position barely changes across
//! consecutive 1 Hz samples; the caller then fires a recovery jump. The
//! detector itself is pure state over observations, so the sampling loop
//! and the recovery action stay testable separately.

use craftmind_traits::Position;

/// Configuration for stuck detection.
#[derive(Debug, Clone)]
pub struct StuckDetectorConfig {
    /// Displacement below this is "still". Default: 0.1 distance units.
    pub epsilon: f64,
    /// Consecutive still samples beyond this trigger recovery. Default: 5.
    pub still_threshold: u32,
}

impl Default for StuckDetectorConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            still_threshold: 5,
        }
    }
}

/// Counts consecutive still samples and signals recovery.
#[derive(Debug)]
pub struct StuckDetector {
    config: StuckDetectorConfig,
    last_position: Option<Position>,
    still_ticks: u32,
}

impl StuckDetector {
    pub fn new(config: StuckDetectorConfig) -> Self {
        Self {
            config,
            last_position: None,
            still_ticks: 0,
        }
    }

    /// Feed one position sample. Returns `true` when recovery should fire;
    /// the counter resets on trigger and on any real movement.
    pub fn observe(&mut self, position: Position) -> bool {
        let trigger = match self.last_position {
            Some(last) if position.distance_to(&last) < self.config.epsilon => {
                self.still_ticks += 1;
                if self.still_ticks > self.config.still_threshold {
                    self.still_ticks = 0;
                    true
                } else {
                    false
                }
            }
            Some(_) => {
                self.still_ticks = 0;
                false
            }
            None => false,
        };
        self.last_position = Some(position);
        trigger
    }

    /// Forget everything (new session, new entity).
    pub fn reset(&mut self) {
        self.last_position = None;
        self.still_ticks = 0;
    }
}
