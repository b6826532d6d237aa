//! Idle-prevention movement.
//!
//! A fixed tick picks one small random action (jump pulse, random look, a
//! short move or strafe) and records its label into [`ActionMemory`].
//! Control releases happen on deferred tasks that re-check session
//! liveness, so a disconnect mid-hold never touches a dead session. A
//! separate 1 Hz sampler feeds the [`StuckDetector`] and fires a recovery
//! jump when the bot stops making progress.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::Arc;
use std::time::Duration;

use rand::RngExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use craftmind_traits::{GameSession, MovementDirection, SessionError};

use crate::memory::SharedActionMemory;
use crate::stuck::{StuckDetector, StuckDetectorConfig};

const JUMP_PULSE: Duration = Duration::from_millis(200);

/// One planned idle-prevention action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum IdleAction {
    Jump,
    LookAround { yaw: f64, pitch: f64 },
    Move {
        direction: MovementDirection,
        hold_ms: u64,
    },
}

impl IdleAction {
    /// Label recorded into action memory.
    fn label(&self) -> &'static str {
        match self {
            IdleAction::Jump => "jumping",
            IdleAction::LookAround { .. } => "looking around",
            IdleAction::Move { direction, .. } => match direction {
                MovementDirection::Forward => "moving forward",
                MovementDirection::Back => "moving backward",
                MovementDirection::Left => "strafing left",
                MovementDirection::Right => "strafing right",
                MovementDirection::Jump => "jumping",
            },
        }
    }

    /// Pick one of the six actions uniformly. Forward/back hold for
    /// 500-1000 ms, strafes for 300-600 ms.
    fn random<R: RngExt>(rng: &mut R) -> Self {
        match rng.random_range(0..6) {
            0 => IdleAction::Jump,
            1 => IdleAction::LookAround {
                yaw: rng.random_range(0.0..TAU),
                pitch: rng.random_range(-FRAC_PI_2..FRAC_PI_2),
            },
            2 => IdleAction::Move {
                direction: MovementDirection::Forward,
                hold_ms: rng.random_range(500..1000),
            },
            3 => IdleAction::Move {
                direction: MovementDirection::Back,
                hold_ms: rng.random_range(500..1000),
            },
            4 => IdleAction::Move {
                direction: MovementDirection::Left,
                hold_ms: rng.random_range(300..600),
            },
            _ => IdleAction::Move {
                direction: MovementDirection::Right,
                hold_ms: rng.random_range(300..600),
            },
        }
    }
}

/// Fires a randomized movement/look action on a fixed tick.
pub struct IdlePreventionScheduler {
    session: Arc<dyn GameSession>,
    actions: SharedActionMemory,
    cancel: CancellationToken,
    tick: Duration,
}

impl IdlePreventionScheduler {
    pub fn new(
        session: Arc<dyn GameSession>,
        actions: SharedActionMemory,
        cancel: CancellationToken,
        tick: Duration,
    ) -> Self {
        Self {
            session,
            actions,
            cancel,
            tick,
        }
    }

    /// Run until the session token is cancelled.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick);
            ticker.tick().await; // skip the immediate tick
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = ticker.tick() => self.tick_once().await,
                }
            }
        })
    }

    async fn tick_once(&self) {
        if !self.session.is_connected() {
            return;
        }
        let action = IdleAction::random(&mut rand::rng());
        if let Err(err) = self.perform(action).await {
            // Never aborts the scheduler; next tick tries again.
            warn!("idle-prevention action failed: {err}");
        }
    }

    pub(crate) async fn perform(&self, action: IdleAction) -> Result<(), SessionError> {
        match action {
            IdleAction::Jump => {
                self.session
                    .set_movement_state(MovementDirection::Jump, true)
                    .await?;
                self.actions.lock().record(action.label());
                spawn_deferred_release(
                    self.session.clone(),
                    self.cancel.clone(),
                    MovementDirection::Jump,
                    JUMP_PULSE,
                );
            }
            IdleAction::LookAround { yaw, pitch } => {
                self.session.look(yaw, pitch, false).await?;
                self.actions.lock().record(action.label());
            }
            IdleAction::Move { direction, hold_ms } => {
                self.session.set_movement_state(direction, true).await?;
                self.actions.lock().record(action.label());
                spawn_deferred_release(
                    self.session.clone(),
                    self.cancel.clone(),
                    direction,
                    Duration::from_millis(hold_ms),
                );
            }
        }
        debug!(action = action.label(), "performed idle-prevention action");
        Ok(())
    }
}

/// Release a movement control after a delay.
///
/// The session may have died or been replaced during the hold, so the
/// task aborts on cancellation and re-checks liveness before acting.
fn spawn_deferred_release(
    session: Arc<dyn GameSession>,
    cancel: CancellationToken,
    direction: MovementDirection,
    delay: Duration,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                if session.is_connected()
                    && let Err(err) = session.set_movement_state(direction, false).await
                {
                    debug!("deferred release of {} failed: {err}", direction.as_str());
                }
            }
        }
    });
}

/// Sample position at 1 Hz and jump when the bot stops moving.
pub fn spawn_stuck_sampler(
    session: Arc<dyn GameSession>,
    actions: SharedActionMemory,
    config: StuckDetectorConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut detector = StuckDetector::new(config);
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(position) = session.position() else { continue };
                    if !detector.observe(position) {
                        continue;
                    }
                    info!("position unchanged for too long, jumping to unstick");
                    if !session.is_connected() {
                        continue;
                    }
                    match session.set_movement_state(MovementDirection::Jump, true).await {
                        Ok(()) => {
                            actions.lock().record("trying to unstick by jumping");
                            spawn_deferred_release(
                                session.clone(),
                                cancel.clone(),
                                MovementDirection::Jump,
                                JUMP_PULSE,
                            );
                        }
                        Err(err) => warn!("unstick jump failed: {err}"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ActionMemory;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingSession {
        connected: AtomicBool,
        movement_calls: Mutex<Vec<(MovementDirection, bool)>>,
        look_calls: Mutex<Vec<(f64, f64)>>,
        position: Mutex<Option<craftmind_traits::Position>>,
    }

    impl RecordingSession {
        fn connected() -> Arc<Self> {
            let session = Self::default();
            session.connected.store(true, Ordering::SeqCst);
            Arc::new(session)
        }
    }

    #[async_trait]
    impl GameSession for RecordingSession {
        async fn chat(&self, _text: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn set_movement_state(
            &self,
            direction: MovementDirection,
            engaged: bool,
        ) -> Result<(), SessionError> {
            self.movement_calls.lock().push((direction, engaged));
            Ok(())
        }

        async fn look(&self, yaw: f64, pitch: f64, _force: bool) -> Result<(), SessionError> {
            self.look_calls.lock().push((yaw, pitch));
            Ok(())
        }

        fn position(&self) -> Option<craftmind_traits::Position> {
            *self.position.lock()
        }

        fn players_present(&self) -> Vec<String> {
            vec![]
        }

        fn latency_ms(&self) -> Option<u64> {
            None
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn quit(&self, _reason: &str) {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    fn scheduler(
        session: Arc<RecordingSession>,
        cancel: CancellationToken,
    ) -> (IdlePreventionScheduler, SharedActionMemory) {
        let actions: SharedActionMemory = Arc::new(Mutex::new(ActionMemory::default()));
        let scheduler = IdlePreventionScheduler::new(
            session,
            actions.clone(),
            cancel,
            Duration::from_secs(7),
        );
        (scheduler, actions)
    }

    #[tokio::test(start_paused = true)]
    async fn jump_pulse_engages_records_and_releases() {
        let session = RecordingSession::connected();
        let (scheduler, actions) = scheduler(session.clone(), CancellationToken::new());

        scheduler.perform(IdleAction::Jump).await.unwrap();
        assert_eq!(
            actions.lock().summary().unwrap(),
            "involved in activities such as: jumping"
        );
        assert_eq!(
            session.movement_calls.lock().as_slice(),
            &[(MovementDirection::Jump, true)]
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(
            session.movement_calls.lock().as_slice(),
            &[
                (MovementDirection::Jump, true),
                (MovementDirection::Jump, false)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_release_skips_dead_session() {
        let session = RecordingSession::connected();
        let (scheduler, _actions) = scheduler(session.clone(), CancellationToken::new());

        scheduler
            .perform(IdleAction::Move {
                direction: MovementDirection::Forward,
                hold_ms: 600,
            })
            .await
            .unwrap();
        session.connected.store(false, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(700)).await;
        // Engage only; the release saw a dead session and did nothing.
        assert_eq!(
            session.movement_calls.lock().as_slice(),
            &[(MovementDirection::Forward, true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_clears_pending_releases() {
        let session = RecordingSession::connected();
        let cancel = CancellationToken::new();
        let (scheduler, _actions) = scheduler(session.clone(), cancel.clone());

        scheduler
            .perform(IdleAction::Move {
                direction: MovementDirection::Left,
                hold_ms: 400,
            })
            .await
            .unwrap();
        cancel.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            session.movement_calls.lock().as_slice(),
            &[(MovementDirection::Left, true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn look_action_is_synchronous_and_recorded() {
        let session = RecordingSession::connected();
        let (scheduler, actions) = scheduler(session.clone(), CancellationToken::new());

        scheduler
            .perform(IdleAction::LookAround {
                yaw: 1.0,
                pitch: -0.5,
            })
            .await
            .unwrap();
        assert_eq!(session.look_calls.lock().as_slice(), &[(1.0, -0.5)]);
        assert_eq!(
            actions.lock().summary().unwrap(),
            "involved in activities such as: looking around"
        );
    }

    #[test]
    fn random_plans_stay_within_documented_ranges() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            match IdleAction::random(&mut rng) {
                IdleAction::Jump => {}
                IdleAction::LookAround { yaw, pitch } => {
                    assert!((0.0..TAU).contains(&yaw));
                    assert!((-FRAC_PI_2..FRAC_PI_2).contains(&pitch));
                }
                IdleAction::Move {
                    direction: MovementDirection::Forward | MovementDirection::Back,
                    hold_ms,
                } => assert!((500..1000).contains(&hold_ms)),
                IdleAction::Move {
                    direction: MovementDirection::Left | MovementDirection::Right,
                    hold_ms,
                } => assert!((300..600).contains(&hold_ms)),
                IdleAction::Move { direction, .. } => {
                    panic!("unexpected move direction {direction:?}")
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_sampler_fires_one_recovery_jump() {
        let session = RecordingSession::connected();
        *session.position.lock() = Some(craftmind_traits::Position::new(1.0, 64.0, 1.0));
        let actions: SharedActionMemory = Arc::new(Mutex::new(ActionMemory::default()));
        let cancel = CancellationToken::new();

        let handle = spawn_stuck_sampler(
            session.clone(),
            actions.clone(),
            StuckDetectorConfig::default(),
            cancel.clone(),
        );

        // Baseline sample plus six still samples trigger exactly once.
        tokio::time::sleep(Duration::from_millis(8500)).await;
        cancel.cancel();
        let _ = handle.await;

        let calls = session.movement_calls.lock();
        let engages = calls
            .iter()
            .filter(|(d, engaged)| *d == MovementDirection::Jump && *engaged)
            .count();
        assert_eq!(engages, 1);
        assert_eq!(
            actions.lock().summary().unwrap(),
            "involved in activities such as: trying to unstick by jumping"
        );
    }
}
