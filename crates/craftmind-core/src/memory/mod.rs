//! Contextual memory for the agent.
//!
//! Two stores, both bounded, both in-memory only (nothing survives a
//! process restart, and both are cleared wholesale on every login):
//! - [`ActionMemory`]: the last few things the bot did, as labels
//! - [`PlayerMemory`]: per-player recent chat with TTL eviction

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod actions;
mod players;

pub use actions::ActionMemory;
pub use players::PlayerMemory;

/// Shared handles. Both stores are mutated from several tasks (idle
/// scheduler, conversation engine, lifecycle manager); sections are short
/// and never held across an await.
pub type SharedActionMemory = Arc<Mutex<ActionMemory>>;
pub type SharedPlayerMemory = Arc<Mutex<PlayerMemory>>;

/// Spawn the periodic sweep for player memory.
///
/// Lazy eviction on read already keeps surfaced context fresh; the sweep
/// exists to bound memory for players who never speak again. Runs until
/// the token is cancelled (session end).
pub fn spawn_sweep_task(
    players: SharedPlayerMemory,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick completes immediately
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = players.lock().sweep();
                    if removed > 0 {
                        debug!(removed, "player memory sweep evicted stale records");
                    }
                }
            }
        }
    })
}
