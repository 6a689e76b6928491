//! Frame-stepped simulation driver
//!
//! One driver per quest instance. The host calls [`SimulationDriver::tick`]
//! once per rendered frame with the token it got from `start`; the driver
//! advances the motion model, checks the stopping conditions and finishes
//! the run exactly once. Rendering happens elsewhere, through observers or
//! by reading [`SimulationDriver::state`].

mod frame_loop;
mod state;

pub use frame_loop::{FrameLoop, RunToken};
pub use state::{LaunchParams, RunPhase, SimulationState};

use bevy::log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{FLOAT_EPSILON, SAFETY_CAP_SECS};
use crate::kinematics::Point2;
use crate::motion::{Integration, MotionModel};
use crate::target::{ConstraintResult, Measurement, TargetRule};

/// Contract violations rejected by the driver (state is left untouched)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    AlreadyRunning,
    NotRunning,
    ResetWhileRunning,
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::AlreadyRunning => write!(f, "a run is already in progress"),
            DriverError::NotRunning => write!(f, "no run in progress"),
            DriverError::ResetWhileRunning => write!(f, "cannot reset while a run is in progress"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Final, frozen result of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Run generation this outcome belongs to
    pub run: u64,
    pub phase: RunPhase,
    pub params: LaunchParams,
    pub state: SimulationState,
    pub evaluation: ConstraintResult,
    pub measurement: Measurement,
    pub launch_speed: f64,
    /// Velocity vector at launch
    pub initial_velocity: Point2,
    pub integration: Integration,
}

impl RunOutcome {
    /// Completed on its own (not stopped, not timed out) and within tolerance
    pub fn success(&self) -> bool {
        matches!(self.phase, RunPhase::TargetReached | RunPhase::Landed)
            && self.evaluation.is_valid
            && self.evaluation.within_tolerance
    }

    /// The body ended the run on the target itself
    pub fn landed_on_target(&self) -> bool {
        self.phase == RunPhase::TargetReached
    }

    /// Magnitude of the average acceleration over the run, |Δv| / t
    pub fn average_acceleration(&self) -> f64 {
        if self.state.t <= FLOAT_EPSILON {
            return 0.0;
        }
        let dvx = self.state.velocity.x - self.initial_velocity.x;
        let dvy = self.state.velocity.y - self.initial_velocity.y;
        dvx.hypot(dvy) / self.state.t
    }
}

/// What a frame tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickStatus {
    /// Token no longer current; nothing was touched
    Stale,
    Running(SimulationState),
    Finished(RunOutcome),
}

/// Handle for removing a state observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&SimulationState, RunPhase) + Send + Sync>;

struct ActiveRun<M> {
    motion: M,
    params: LaunchParams,
    started_at: f64,
    state: SimulationState,
    token: RunToken,
}

/// Generic run state machine over a motion strategy and a target strategy
pub struct SimulationDriver<M: MotionModel, R: TargetRule> {
    target: R,
    safety_cap: f64,
    phase: RunPhase,
    run: Option<ActiveRun<M>>,
    last_outcome: Option<RunOutcome>,
    frames: FrameLoop,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl<M: MotionModel, R: TargetRule> SimulationDriver<M, R> {
    pub fn new(target: R) -> Self {
        Self {
            target,
            safety_cap: SAFETY_CAP_SECS,
            phase: RunPhase::Idle,
            run: None,
            last_outcome: None,
            frames: FrameLoop::default(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn with_safety_cap(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            self.safety_cap = seconds;
        }
        self
    }

    pub fn with_display_interval(mut self, seconds: f64) -> Self {
        self.frames = FrameLoop::new(seconds);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    pub fn target(&self) -> &R {
        &self.target
    }

    /// Swap the target between runs
    pub fn set_target(&mut self, target: R) -> Result<(), DriverError> {
        if self.is_running() {
            return Err(DriverError::AlreadyRunning);
        }
        self.target = target;
        Ok(())
    }

    /// Current (live or frozen) state, None when idle
    pub fn state(&self) -> Option<&SimulationState> {
        self.run.as_ref().map(|run| &run.state)
    }

    pub fn params(&self) -> Option<&LaunchParams> {
        self.run.as_ref().map(|run| &run.params)
    }

    pub fn motion(&self) -> Option<&M> {
        self.run.as_ref().map(|run| &run.motion)
    }

    /// Token of the run in progress
    pub fn token(&self) -> Option<RunToken> {
        self.run
            .as_ref()
            .map(|run| run.token)
            .filter(|token| self.frames.is_live(*token))
    }

    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.last_outcome.as_ref()
    }

    /// Whether any frame or display callback is still scheduled
    pub fn has_scheduled(&self) -> bool {
        self.frames.has_scheduled()
    }

    /// Live evaluation of the current state against the target
    pub fn evaluate(&self) -> Option<ConstraintResult> {
        self.run
            .as_ref()
            .map(|run| self.target.evaluate(&run.state, &run.params))
    }

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&SimulationState, RunPhase) + Send + Sync + 'static,
    ) -> ObserverId {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Begin a run at host time `now` (seconds). Rejected while a run is in progress.
    pub fn start(&mut self, motion: M, params: LaunchParams, now: f64) -> Result<RunToken, DriverError> {
        if self.is_running() {
            return Err(DriverError::AlreadyRunning);
        }
        let token = self.frames.schedule(now);
        let state = motion.initial_state();
        self.run = Some(ActiveRun {
            motion,
            params,
            started_at: now,
            state,
            token,
        });
        self.last_outcome = None;
        self.phase = RunPhase::Running;
        debug!(
            "Run {} started: v={:.2} angle={:.1}",
            token.generation(),
            params.velocity,
            params.angle_degrees
        );
        self.notify(state);
        Ok(token)
    }

    /// Advance the run to host time `now`
    pub fn tick(&mut self, token: RunToken, now: f64) -> TickStatus {
        if !self.frames.is_live(token) || !self.is_running() {
            return TickStatus::Stale;
        }
        let cap = self.safety_cap;
        let Some(run) = self.run.as_mut() else {
            return TickStatus::Stale;
        };
        let elapsed = (now - run.started_at).max(0.0);
        run.motion.advance(&mut run.state, elapsed.min(cap));

        let next = if self.target.reached(&run.state, &run.params) {
            RunPhase::TargetReached
        } else if run.motion.at_boundary(&run.state) {
            RunPhase::Landed
        } else if elapsed >= cap {
            RunPhase::TimedOut
        } else {
            RunPhase::Running
        };

        let state = run.state;
        if next == RunPhase::Running {
            self.notify(state);
            return TickStatus::Running(state);
        }
        match self.finish(next) {
            Some(outcome) => TickStatus::Finished(outcome),
            None => TickStatus::Stale,
        }
    }

    /// Cancel the run, freezing the state at host time `now`
    pub fn stop(&mut self, now: f64) -> Result<RunOutcome, DriverError> {
        if !self.is_running() {
            return Err(DriverError::NotRunning);
        }
        let cap = self.safety_cap;
        if let Some(run) = self.run.as_mut() {
            let elapsed = (now - run.started_at).max(0.0).min(cap);
            // Fixed-step models bound each advance; keep going until caught up
            loop {
                let before = run.state.t;
                run.motion.advance(&mut run.state, elapsed);
                if run.state.t == before {
                    break;
                }
            }
        }
        self.finish(RunPhase::Stopped).ok_or(DriverError::NotRunning)
    }

    /// Back to Idle with the initial pose. Rejected while running.
    pub fn reset(&mut self) -> Result<(), DriverError> {
        if self.is_running() {
            return Err(DriverError::ResetWhileRunning);
        }
        self.frames.cancel();
        let pose = self
            .run
            .take()
            .map(|run| run.motion.initial_state())
            .unwrap_or_default();
        self.last_outcome = None;
        self.phase = RunPhase::Idle;
        self.notify(pose);
        Ok(())
    }

    /// Cancel everything and drop observers; no completion is reported
    pub fn teardown(&mut self) {
        if self.frames.cancel() {
            debug!("Driver torn down with callbacks still scheduled");
        }
        self.run = None;
        self.phase = RunPhase::Idle;
        self.observers.clear();
    }

    /// Elapsed seconds for the display readout, when due
    pub fn poll_display(&mut self, now: f64) -> Option<f64> {
        let token = self.token()?;
        self.frames.poll_display(token, now)
    }

    fn finish(&mut self, phase: RunPhase) -> Option<RunOutcome> {
        self.frames.cancel();
        let run = self.run.as_ref()?;
        let outcome = RunOutcome {
            run: run.token.generation(),
            phase,
            params: run.params,
            state: run.state,
            evaluation: self.target.evaluate(&run.state, &run.params),
            measurement: self.target.measure(&run.state, &run.params),
            launch_speed: run.motion.launch_speed(),
            initial_velocity: run.motion.initial_state().velocity,
            integration: run.motion.integration(),
        };
        self.phase = phase;
        self.last_outcome = Some(outcome);
        debug!(
            "Run {} finished: {} at t={:.3}s",
            outcome.run, phase, outcome.state.t
        );
        self.notify(outcome.state);
        Some(outcome)
    }

    fn notify(&mut self, state: SimulationState) {
        let phase = self.phase;
        for (_, observer) in self.observers.iter_mut() {
            observer(&state, phase);
        }
    }
}

impl<M: MotionModel, R: TargetRule> Drop for SimulationDriver<M, R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::kinematics::Kinematics;
    use crate::motion::{MomentumCart, Motion, Projectile, VerticalLaunch};
    use crate::target::{DirectionalHint, Target};

    const FRAME: f64 = 1.0 / 60.0;

    fn run_frames(
        driver: &mut SimulationDriver<Motion, Target>,
        token: RunToken,
        start: f64,
        max_secs: f64,
    ) -> Option<RunOutcome> {
        let mut now = start;
        while now - start < max_secs {
            now += FRAME;
            if let TickStatus::Finished(outcome) = driver.tick(token, now) {
                return Some(outcome);
            }
        }
        None
    }

    fn archer() -> (Motion, LaunchParams) {
        (
            Motion::Projectile(Projectile::new(25.0, 45.0, Kinematics::EARTH)),
            LaunchParams::angled(25.0, 45.0),
        )
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let target = Target::Distance {
            distance: 63.7,
            tolerance: 2.5,
        };
        let mut driver = SimulationDriver::new(target);
        let (motion, params) = archer();
        let token = driver.start(motion, params, 0.0).unwrap();
        driver.tick(token, 0.1);

        let (motion, params) = archer();
        assert_eq!(driver.start(motion, params, 0.2), Err(DriverError::AlreadyRunning));
        assert_eq!(driver.phase(), RunPhase::Running);
        // Still the same run, still ticking
        assert_eq!(driver.token(), Some(token));
        assert!(matches!(driver.tick(token, 0.3), TickStatus::Running(_)));
    }

    #[test]
    fn test_archer_lands_on_distance() {
        let k = Kinematics::EARTH;
        let target = Target::Distance {
            distance: k.range(25.0, 45.0),
            tolerance: 2.5,
        };
        let mut driver = SimulationDriver::new(target);
        let (motion, params) = archer();
        let token = driver.start(motion, params, 5.0).unwrap();
        let outcome = run_frames(&mut driver, token, 5.0, 10.0).unwrap();

        assert_eq!(outcome.phase, RunPhase::Landed);
        assert!(outcome.success());
        assert!(outcome.evaluation.error_magnitude < 1e-9);
        assert_eq!(outcome.evaluation.hint, DirectionalHint::OnTarget);
        assert!(!driver.has_scheduled());
        // Same speed at both ends; the velocity vector turned by g·t
        assert!((outcome.average_acceleration() - k.gravity).abs() < 1e-6);
    }

    #[test]
    fn test_flying_through_goal_zone_is_not_a_hit() {
        let zone = Target::GoalZone(crate::target::GoalZone::new(10.0, 12.0, 10.0, 5.0));
        let mut driver = SimulationDriver::new(zone);
        let (motion, params) = archer();
        let token = driver.start(motion, params, 0.0).unwrap();
        let outcome = run_frames(&mut driver, token, 0.0, 10.0).unwrap();

        assert_eq!(outcome.phase, RunPhase::Landed);
        assert!(!outcome.success());
        assert_eq!(outcome.evaluation.hint, DirectionalHint::TooFar);
        assert!(outcome.state.position.x > 60.0);
    }

    #[test]
    fn test_completion_reported_once() {
        let target = Target::Distance {
            distance: 63.7,
            tolerance: 2.5,
        };
        let finished = Arc::new(Mutex::new(0));
        let mut driver = SimulationDriver::new(target);
        let counter = Arc::clone(&finished);
        driver.subscribe(move |_, phase| {
            if phase.is_terminal() {
                *counter.lock().unwrap() += 1;
            }
        });

        let (motion, params) = archer();
        let token = driver.start(motion, params, 0.0).unwrap();
        assert!(run_frames(&mut driver, token, 0.0, 10.0).is_some());
        // Late callbacks carrying the old token do nothing
        assert_eq!(driver.tick(token, 20.0), TickStatus::Stale);
        assert_eq!(driver.tick(token, 21.0), TickStatus::Stale);
        assert_eq!(*finished.lock().unwrap(), 1);
    }

    #[test]
    fn test_stop_freezes_closed_form_state() {
        let k = Kinematics::EARTH;
        let target = Target::Distance {
            distance: 40.0,
            tolerance: 1.0,
        };
        let mut driver = SimulationDriver::new(target);
        let motion = Motion::Projectile(Projectile::new(20.0, 45.0, k));
        let token = driver.start(motion, LaunchParams::angled(20.0, 45.0), 0.0).unwrap();
        driver.tick(token, 0.25);

        let outcome = driver.stop(0.5).unwrap();
        let expected = k.position_at(20.0, 45.0, 0.5);
        assert_eq!(outcome.phase, RunPhase::Stopped);
        assert!(!outcome.success());
        assert!((outcome.state.travel - expected.x).abs() < 1e-9);
        assert!((outcome.state.max_height - expected.y).abs() < 1e-9);
        assert!(!driver.has_scheduled());
        assert_eq!(driver.tick(token, 0.6), TickStatus::Stale);
        assert_eq!(driver.stop(0.7).unwrap_err(), DriverError::NotRunning);
    }

    #[test]
    fn test_safety_cap_times_out() {
        // A zone nothing reaches, on a flight longer than the cap
        let target = Target::Duration {
            seconds: 100.0,
            tolerance: 0.1,
        };
        let mut driver = SimulationDriver::new(target).with_safety_cap(2.0);
        let motion = Motion::Vertical(VerticalLaunch::new(50.0, Kinematics::EARTH));
        let token = driver.start(motion, LaunchParams::vertical(50.0), 0.0).unwrap();
        let outcome = run_frames(&mut driver, token, 0.0, 5.0).unwrap();
        assert_eq!(outcome.phase, RunPhase::TimedOut);
        assert!((outcome.state.t - 2.0).abs() < 1e-9);
        assert!(!outcome.success());
    }

    #[test]
    fn test_reset_rules() {
        let target = Target::Distance {
            distance: 63.7,
            tolerance: 2.5,
        };
        let mut driver = SimulationDriver::new(target);
        assert!(driver.reset().is_ok());

        let (motion, params) = archer();
        let token = driver.start(motion, params, 0.0).unwrap();
        assert_eq!(driver.reset(), Err(DriverError::ResetWhileRunning));
        assert_eq!(driver.phase(), RunPhase::Running);

        driver.stop(0.3).unwrap();
        assert!(driver.reset().is_ok());
        assert_eq!(driver.phase(), RunPhase::Idle);
        assert!(driver.state().is_none());
        assert_eq!(driver.tick(token, 0.4), TickStatus::Stale);
    }

    #[test]
    fn test_rising_orb_reaches_platform() {
        let k = Kinematics::EARTH;
        let target = Target::VelocityMatch {
            height: 30.0,
            height_tolerance: 0.5,
            velocity_tolerance: 0.5,
            kinematics: k,
        };
        let mut driver = SimulationDriver::new(target);
        let v = 24.26;
        let token = driver
            .start(Motion::Vertical(VerticalLaunch::new(v, k)), LaunchParams::vertical(v), 0.0)
            .unwrap();
        let outcome = run_frames(&mut driver, token, 0.0, 10.0).unwrap();
        assert_eq!(outcome.phase, RunPhase::TargetReached);
        assert!(outcome.success());
        assert!(outcome.landed_on_target());
    }

    #[test]
    fn test_display_ticker_cancelled_with_run() {
        let target = Target::Distance {
            distance: 63.7,
            tolerance: 2.5,
        };
        let mut driver = SimulationDriver::new(target);
        let (motion, params) = archer();
        driver.start(motion, params, 0.0).unwrap();
        assert_eq!(driver.poll_display(0.0), Some(0.0));
        assert!(driver.poll_display(0.15).is_some());
        driver.stop(0.2).unwrap();
        assert_eq!(driver.poll_display(0.3), None);
    }

    #[test]
    fn test_teardown_cancels_callbacks() {
        let target = Target::Distance {
            distance: 63.7,
            tolerance: 2.5,
        };
        let calls = Arc::new(Mutex::new(0));
        let mut driver = SimulationDriver::new(target);
        let counter = Arc::clone(&calls);
        driver.subscribe(move |_, _| *counter.lock().unwrap() += 1);

        let (motion, params) = archer();
        let token = driver.start(motion, params, 0.0).unwrap();
        assert!(driver.has_scheduled());
        driver.tick(token, 0.1);
        let seen = *calls.lock().unwrap();
        assert!(seen >= 2);

        driver.teardown();
        assert!(!driver.has_scheduled());
        assert_eq!(driver.phase(), RunPhase::Idle);
        assert_eq!(driver.tick(token, 0.2), TickStatus::Stale);
        assert_eq!(driver.poll_display(0.3), None);
        assert!(driver.last_outcome().is_none());

        // Observers went with the teardown
        let (motion, params) = archer();
        let token = driver.start(motion, params, 1.0).unwrap();
        driver.tick(token, 1.1);
        assert_eq!(*calls.lock().unwrap(), seen);
    }

    #[test]
    fn test_unsubscribed_observer_is_not_called() {
        let target = Target::Distance {
            distance: 63.7,
            tolerance: 2.5,
        };
        let kept = Arc::new(Mutex::new(0));
        let removed = Arc::new(Mutex::new(0));
        let mut driver = SimulationDriver::new(target);
        let counter = Arc::clone(&kept);
        driver.subscribe(move |_, _| *counter.lock().unwrap() += 1);
        let counter = Arc::clone(&removed);
        let id = driver.subscribe(move |_, _| *counter.lock().unwrap() += 1);

        assert!(driver.unsubscribe(id));
        assert!(!driver.unsubscribe(id));

        let (motion, params) = archer();
        let token = driver.start(motion, params, 0.0).unwrap();
        driver.tick(token, 0.1);
        assert!(*kept.lock().unwrap() >= 2);
        assert_eq!(*removed.lock().unwrap(), 0);
    }

    #[test]
    fn test_stop_after_long_stall_catches_up() {
        let k = Kinematics::EARTH;
        let target = Target::Distance {
            distance: 500.0,
            tolerance: 1.0,
        };
        let mut driver = SimulationDriver::new(target);
        let cart = MomentumCart::new(1.0, 8.0, k)
            .with_drag(0.0, 0.0)
            .with_track_length(1000.0);
        let token = driver
            .start(Motion::Cart(cart), LaunchParams::angled(8.0, 0.0), 0.0)
            .unwrap();
        driver.tick(token, FRAME);

        // No frames for 25 s, far more than one tick may integrate
        let outcome = driver.stop(25.0).unwrap();
        assert!((outcome.state.t - 25.0).abs() < 0.02);
        assert!((outcome.state.travel - 200.0).abs() < 0.2);
    }

    #[test]
    fn test_set_target_rejected_while_running() {
        let mut driver = SimulationDriver::new(Target::Distance {
            distance: 10.0,
            tolerance: 1.0,
        });
        let (motion, params) = archer();
        driver.start(motion, params, 0.0).unwrap();
        let other = Target::Distance {
            distance: 20.0,
            tolerance: 1.0,
        };
        assert_eq!(driver.set_target(other), Err(DriverError::AlreadyRunning));
        driver.stop(0.1).unwrap();
        assert!(driver.set_target(other).is_ok());
        assert_eq!(driver.target().value(), 20.0);
    }
}
