//! Motion models driven by the simulation driver
//!
//! Closed-form models recompute the whole state from elapsed time on every
//! tick. Models with drag have no closed form and integrate with a fixed
//! `dt`, consuming elapsed time through an accumulator so slow frames do not
//! change the result.

use serde::{Deserialize, Serialize};

use crate::constants::{FIXED_DT, MAX_STEPS_PER_TICK};
use crate::driver::SimulationState;
use crate::kinematics::{Kinematics, Point2};

/// How a model turns elapsed time into state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Integration {
    ClosedForm,
    FixedStep,
}

/// Physics strategy for one run
pub trait MotionModel {
    fn integration(&self) -> Integration;

    /// State at t = 0
    fn initial_state(&self) -> SimulationState;

    /// Bring `state` up to `elapsed` seconds after launch
    fn advance(&self, state: &mut SimulationState, elapsed: f64);

    /// Whether the body has hit its terminal boundary (ground, end of track, rest)
    fn at_boundary(&self, state: &SimulationState) -> bool;

    /// Launch speed recorded with the outcome
    fn launch_speed(&self) -> f64;
}

// =============================================================================
// CLOSED-FORM MODELS
// =============================================================================

/// Angled launch from the ground
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub velocity: f64,
    pub angle_degrees: f64,
    pub kinematics: Kinematics,
}

impl Projectile {
    pub fn new(velocity: f64, angle_degrees: f64, kinematics: Kinematics) -> Self {
        Self {
            velocity,
            angle_degrees,
            kinematics,
        }
    }

    pub fn time_of_flight(&self) -> f64 {
        self.kinematics.time_of_flight(self.velocity, self.angle_degrees)
    }
}

impl MotionModel for Projectile {
    fn integration(&self) -> Integration {
        Integration::ClosedForm
    }

    fn initial_state(&self) -> SimulationState {
        SimulationState {
            velocity: self.kinematics.velocity_at(self.velocity, self.angle_degrees, 0.0),
            ..Default::default()
        }
    }

    fn advance(&self, state: &mut SimulationState, elapsed: f64) {
        let t = elapsed.clamp(0.0, self.time_of_flight());
        let pos = self.kinematics.position_at(self.velocity, self.angle_degrees, t);
        state.t = t;
        state.position = Point2::new(pos.x, pos.y.max(0.0));
        state.velocity = self.kinematics.velocity_at(self.velocity, self.angle_degrees, t);
        state.travel = state.position.x;
        state.max_height = state.max_height.max(state.position.y);
    }

    fn at_boundary(&self, state: &SimulationState) -> bool {
        state.t >= self.time_of_flight()
    }

    fn launch_speed(&self) -> f64 {
        self.velocity.max(0.0)
    }
}

/// Straight-up launch (rising orb)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalLaunch {
    pub velocity: f64,
    pub kinematics: Kinematics,
}

impl VerticalLaunch {
    pub fn new(velocity: f64, kinematics: Kinematics) -> Self {
        Self {
            velocity,
            kinematics,
        }
    }

    pub fn time_of_flight(&self) -> f64 {
        self.kinematics.vertical_time_of_flight(self.velocity)
    }
}

impl MotionModel for VerticalLaunch {
    fn integration(&self) -> Integration {
        Integration::ClosedForm
    }

    fn initial_state(&self) -> SimulationState {
        SimulationState {
            velocity: Point2::new(0.0, self.velocity.max(0.0)),
            ..Default::default()
        }
    }

    fn advance(&self, state: &mut SimulationState, elapsed: f64) {
        let t = elapsed.clamp(0.0, self.time_of_flight());
        let y = self.kinematics.vertical_position_at(self.velocity, t).max(0.0);
        state.t = t;
        state.position = Point2::new(0.0, y);
        state.velocity = if self.time_of_flight() > 0.0 {
            Point2::new(0.0, self.velocity - self.kinematics.gravity * t)
        } else {
            Point2::ZERO
        };
        state.travel = 0.0;
        state.max_height = state.max_height.max(y);
    }

    fn at_boundary(&self, state: &SimulationState) -> bool {
        state.t >= self.time_of_flight()
    }

    fn launch_speed(&self) -> f64 {
        self.velocity.max(0.0)
    }
}

/// Release from rest at `drop_height`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreeFall {
    pub drop_height: f64,
    pub kinematics: Kinematics,
}

impl FreeFall {
    pub fn new(drop_height: f64, kinematics: Kinematics) -> Self {
        Self {
            drop_height,
            kinematics,
        }
    }

    pub fn fall_time(&self) -> f64 {
        self.kinematics.fall_time(self.drop_height)
    }
}

impl MotionModel for FreeFall {
    fn integration(&self) -> Integration {
        Integration::ClosedForm
    }

    fn initial_state(&self) -> SimulationState {
        let h = self.drop_height.max(0.0);
        SimulationState {
            position: Point2::new(0.0, h),
            max_height: h,
            ..Default::default()
        }
    }

    fn advance(&self, state: &mut SimulationState, elapsed: f64) {
        let t = elapsed.clamp(0.0, self.fall_time());
        let g = self.kinematics.gravity;
        state.t = t;
        state.position = Point2::new(0.0, (self.drop_height.max(0.0) - 0.5 * g * t * t).max(0.0));
        state.velocity = Point2::new(0.0, -g * t);
        state.travel = self.drop_height.max(0.0) - state.position.y;
    }

    fn at_boundary(&self, state: &SimulationState) -> bool {
        state.t >= self.fall_time()
    }

    fn launch_speed(&self) -> f64 {
        0.0
    }
}

/// Block released from rest at the top of a ramp, kinetic friction μ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InclineSlide {
    pub ramp_length: f64,
    pub angle_degrees: f64,
    pub friction: f64,
    pub kinematics: Kinematics,
}

impl InclineSlide {
    pub fn new(ramp_length: f64, angle_degrees: f64, friction: f64, kinematics: Kinematics) -> Self {
        Self {
            ramp_length,
            angle_degrees,
            friction,
            kinematics,
        }
    }

    pub fn acceleration(&self) -> f64 {
        self.kinematics
            .incline_acceleration_with_friction(self.angle_degrees, self.friction)
    }

    /// Time to reach the foot of the ramp; 0 when the block never moves
    pub fn time_to_bottom(&self) -> f64 {
        let a = self.acceleration();
        if a <= 0.0 || !self.ramp_length.is_finite() || self.ramp_length <= 0.0 {
            return 0.0;
        }
        (2.0 * self.ramp_length / a).sqrt()
    }

    fn top_height(&self) -> f64 {
        self.ramp_length.max(0.0) * self.angle_degrees.to_radians().sin().max(0.0)
    }
}

impl MotionModel for InclineSlide {
    fn integration(&self) -> Integration {
        Integration::ClosedForm
    }

    fn initial_state(&self) -> SimulationState {
        let top = self.top_height();
        SimulationState {
            position: Point2::new(0.0, top),
            max_height: top,
            ..Default::default()
        }
    }

    fn advance(&self, state: &mut SimulationState, elapsed: f64) {
        let t = elapsed.clamp(0.0, self.time_to_bottom());
        let a = self.acceleration();
        let theta = self.angle_degrees.to_radians();
        let s = (0.5 * a * t * t).min(self.ramp_length.max(0.0));
        let speed = a * t;
        state.t = t;
        state.travel = s;
        state.position = Point2::new(s * theta.cos(), (self.ramp_length.max(0.0) - s) * theta.sin().max(0.0));
        state.velocity = Point2::new(speed * theta.cos(), -speed * theta.sin());
    }

    fn at_boundary(&self, state: &SimulationState) -> bool {
        state.t >= self.time_to_bottom()
    }

    fn launch_speed(&self) -> f64 {
        0.0
    }
}

// =============================================================================
// FIXED-STEP MODELS
// =============================================================================

/// Cart pushed along a flat track, slowed by quadratic drag and rolling friction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumCart {
    pub mass: f64,
    pub push_velocity: f64,
    /// Quadratic drag coefficient (N·s²/m²)
    pub drag: f64,
    /// Rolling friction coefficient μ
    pub rolling_friction: f64,
    pub track_length: f64,
    pub kinematics: Kinematics,
    pub dt: f64,
}

impl MomentumCart {
    pub fn new(mass: f64, push_velocity: f64, kinematics: Kinematics) -> Self {
        Self {
            mass,
            push_velocity,
            drag: 0.05,
            rolling_friction: 0.05,
            track_length: 100.0,
            kinematics,
            dt: FIXED_DT,
        }
    }

    pub fn with_drag(mut self, drag: f64, rolling_friction: f64) -> Self {
        self.drag = drag.max(0.0);
        self.rolling_friction = rolling_friction.max(0.0);
        self
    }

    pub fn with_track_length(mut self, track_length: f64) -> Self {
        self.track_length = track_length;
        self
    }

    fn valid(&self) -> bool {
        self.mass.is_finite()
            && self.mass > 0.0
            && self.push_velocity.is_finite()
            && self.push_velocity > 0.0
            && self.dt > 0.0
    }

    /// One explicit step: v += (F/m)·dt, x += v·dt
    fn step(&self, state: &mut SimulationState) {
        let v = state.velocity.x;
        let net_force = -(self.drag * v * v + self.rolling_friction * self.mass * self.kinematics.gravity);
        let mut v_next = v + net_force / self.mass * self.dt;
        if v_next <= 0.0 {
            v_next = 0.0;
        }
        state.velocity = Point2::new(v_next, 0.0);
        state.position.x = (state.position.x + v_next * self.dt).min(self.track_length.max(0.0));
        state.travel = state.position.x;
        state.t += self.dt;
    }
}

impl MotionModel for MomentumCart {
    fn integration(&self) -> Integration {
        Integration::FixedStep
    }

    fn initial_state(&self) -> SimulationState {
        SimulationState {
            velocity: Point2::new(if self.valid() { self.push_velocity } else { 0.0 }, 0.0),
            ..Default::default()
        }
    }

    fn advance(&self, state: &mut SimulationState, elapsed: f64) {
        if !self.valid() {
            return;
        }
        let mut steps = 0;
        // Small slack so t = n·dt lands on the step that reaches it
        while state.t + self.dt <= elapsed + 1e-12 && steps < MAX_STEPS_PER_TICK {
            if self.at_boundary(state) {
                break;
            }
            self.step(state);
            steps += 1;
        }
    }

    fn at_boundary(&self, state: &SimulationState) -> bool {
        state.velocity.x <= 0.0 || state.position.x >= self.track_length
    }

    fn launch_speed(&self) -> f64 {
        if self.valid() { self.push_velocity } else { 0.0 }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Every motion model a quest can pick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum Motion {
    Projectile(Projectile),
    Vertical(VerticalLaunch),
    FreeFall(FreeFall),
    Incline(InclineSlide),
    Cart(MomentumCart),
}

impl Motion {
    fn inner(&self) -> &dyn MotionModel {
        match self {
            Motion::Projectile(m) => m,
            Motion::Vertical(m) => m,
            Motion::FreeFall(m) => m,
            Motion::Incline(m) => m,
            Motion::Cart(m) => m,
        }
    }
}

impl MotionModel for Motion {
    fn integration(&self) -> Integration {
        self.inner().integration()
    }

    fn initial_state(&self) -> SimulationState {
        self.inner().initial_state()
    }

    fn advance(&self, state: &mut SimulationState, elapsed: f64) {
        self.inner().advance(state, elapsed)
    }

    fn at_boundary(&self, state: &SimulationState) -> bool {
        self.inner().at_boundary(state)
    }

    fn launch_speed(&self) -> f64 {
        self.inner().launch_speed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to(model: &impl MotionModel, elapsed: f64) -> SimulationState {
        let mut state = model.initial_state();
        model.advance(&mut state, elapsed);
        state
    }

    #[test]
    fn test_projectile_matches_closed_form() {
        let k = Kinematics::EARTH;
        let model = Projectile::new(20.0, 45.0, k);
        let state = run_to(&model, 0.5);
        let expected = k.position_at(20.0, 45.0, 0.5);
        assert!((state.position.x - expected.x).abs() < 1e-12);
        assert!((state.position.y - expected.y).abs() < 1e-12);
        assert!(!model.at_boundary(&state));
    }

    #[test]
    fn test_projectile_time_clamped_to_flight() {
        let model = Projectile::new(20.0, 45.0, Kinematics::EARTH);
        let state = run_to(&model, 100.0);
        assert_eq!(state.t, model.time_of_flight());
        assert!(model.at_boundary(&state));
        assert!(state.position.y >= 0.0);
    }

    #[test]
    fn test_degenerate_projectile_lands_immediately() {
        let model = Projectile::new(0.0, 45.0, Kinematics::EARTH);
        let state = run_to(&model, 0.0);
        assert!(model.at_boundary(&state));
        assert_eq!(state.position, Point2::ZERO);
    }

    #[test]
    fn test_vertical_tracks_peak() {
        let k = Kinematics::EARTH;
        let model = VerticalLaunch::new(20.0, k);
        let mut state = model.initial_state();
        let mut t = 0.0;
        while t < 3.0 {
            t += 1.0 / 60.0;
            model.advance(&mut state, t);
        }
        assert!((state.max_height - k.max_height(20.0, None)).abs() < 0.01);
        assert!(state.velocity.y < 0.0);
    }

    #[test]
    fn test_free_fall_lands_at_fall_time() {
        let model = FreeFall::new(20.0, Kinematics::EARTH);
        let state = run_to(&model, 10.0);
        assert!(model.at_boundary(&state));
        assert!(state.position.y.abs() < 1e-9);
        assert!((state.travel - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_incline_reaches_bottom() {
        let model = InclineSlide::new(10.0, 30.0, 0.0, Kinematics::EARTH);
        let t_bottom = model.time_to_bottom();
        let state = run_to(&model, t_bottom + 1.0);
        assert!(model.at_boundary(&state));
        assert!((state.travel - 10.0).abs() < 1e-9);
        assert!(state.position.y.abs() < 1e-9);

        let stuck = InclineSlide::new(10.0, 20.0, 0.9, Kinematics::EARTH);
        assert!(stuck.at_boundary(&stuck.initial_state()));
    }

    #[test]
    fn test_cart_is_frame_rate_independent() {
        let cart = MomentumCart::new(2.0, 8.0, Kinematics::EARTH);

        // One big tick vs many small ones
        let coarse = run_to(&cart, 1.0);
        let mut fine = cart.initial_state();
        let mut t: f64 = 0.0;
        while t < 1.0 {
            t += 0.004;
            cart.advance(&mut fine, t.min(1.0));
        }
        assert_eq!(coarse.t, fine.t);
        assert_eq!(coarse.position.x, fine.position.x);
        assert!(coarse.velocity.x < 8.0);
    }

    #[test]
    fn test_cart_comes_to_rest() {
        let cart = MomentumCart::new(1.0, 3.0, Kinematics::EARTH).with_drag(0.1, 0.2);
        let mut state = cart.initial_state();
        let mut t: f64 = 0.0;
        while !cart.at_boundary(&state) && t < 30.0 {
            t += 0.1;
            cart.advance(&mut state, t);
        }
        assert!(cart.at_boundary(&state));
        assert_eq!(state.velocity.x, 0.0);
        assert!(state.position.x > 0.0 && state.position.x < cart.track_length);
    }

    #[test]
    fn test_motion_dispatch() {
        let motion = Motion::Projectile(Projectile::new(25.0, 45.0, Kinematics::EARTH));
        assert_eq!(motion.integration(), Integration::ClosedForm);
        assert_eq!(motion.launch_speed(), 25.0);
        let cart = Motion::Cart(MomentumCart::new(1.0, 2.0, Kinematics::EARTH));
        assert_eq!(cart.integration(), Integration::FixedStep);
    }
}
