//! Closed-form kinematics shared by every quest
//!
//! All functions are total: out-of-domain input (non-positive velocity, angle
//! outside the open interval (0°, 90°), non-finite values) yields a degenerate
//! result (0.0, `None`, or an empty trajectory) instead of an error. Angles are
//! taken in degrees and converted internally. Nothing here rounds.

use serde::{Deserialize, Serialize};

use crate::constants::{FLOAT_EPSILON, GRAVITY, TRAJECTORY_SAMPLES};

/// 2D point or vector in metres (x right, y up)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One sample of a precomputed trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub t: f64,
}

/// Kinematics under a fixed gravitational acceleration.
///
/// The free functions at module level use [`Kinematics::EARTH`]; quests with
/// a configured gravity build their own instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub gravity: f64,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self::EARTH
    }
}

fn valid_speed(velocity: f64) -> bool {
    velocity.is_finite() && velocity > 0.0
}

fn valid_launch_angle(angle_degrees: f64) -> bool {
    angle_degrees.is_finite() && angle_degrees > 0.0 && angle_degrees < 90.0
}

impl Kinematics {
    pub const EARTH: Self = Self { gravity: GRAVITY };

    pub fn new(gravity: f64) -> Self {
        Self { gravity }
    }

    fn g(&self) -> Option<f64> {
        (self.gravity.is_finite() && self.gravity > 0.0).then_some(self.gravity)
    }

    /// Time until a ground launch returns to launch height: 2·v·sin(θ)/g
    pub fn time_of_flight(&self, velocity: f64, angle_degrees: f64) -> f64 {
        let Some(g) = self.g() else { return 0.0 };
        if !valid_speed(velocity) || !valid_launch_angle(angle_degrees) {
            return 0.0;
        }
        2.0 * velocity * angle_degrees.to_radians().sin() / g
    }

    /// Time of flight for a straight-up launch: 2·v/g
    pub fn vertical_time_of_flight(&self, velocity: f64) -> f64 {
        match self.g() {
            Some(g) if valid_speed(velocity) => 2.0 * velocity / g,
            _ => 0.0,
        }
    }

    /// Position at time `t` after launch from the origin (no ground clamp)
    pub fn position_at(&self, velocity: f64, angle_degrees: f64, t: f64) -> Point2 {
        let Some(g) = self.g() else { return Point2::ZERO };
        if !valid_speed(velocity) || !valid_launch_angle(angle_degrees) || !t.is_finite() {
            return Point2::ZERO;
        }
        let theta = angle_degrees.to_radians();
        Point2::new(
            velocity * theta.cos() * t,
            velocity * theta.sin() * t - 0.5 * g * t * t,
        )
    }

    /// Velocity vector at time `t` after launch
    pub fn velocity_at(&self, velocity: f64, angle_degrees: f64, t: f64) -> Point2 {
        let Some(g) = self.g() else { return Point2::ZERO };
        if !valid_speed(velocity) || !valid_launch_angle(angle_degrees) || !t.is_finite() {
            return Point2::ZERO;
        }
        let theta = angle_degrees.to_radians();
        Point2::new(velocity * theta.cos(), velocity * theta.sin() - g * t)
    }

    /// Height at time `t` of a straight-up launch
    pub fn vertical_position_at(&self, velocity: f64, t: f64) -> f64 {
        match self.g() {
            Some(g) if valid_speed(velocity) && t.is_finite() => velocity * t - 0.5 * g * t * t,
            _ => 0.0,
        }
    }

    /// Sample the flight path at a fixed count over [0, time_of_flight].
    /// Sampling stops at the first point that would be below ground.
    pub fn trajectory(&self, velocity: f64, angle_degrees: f64) -> Vec<TrajectoryPoint> {
        let tof = self.time_of_flight(velocity, angle_degrees);
        if tof <= 0.0 {
            return Vec::new();
        }

        let mut points = Vec::with_capacity(TRAJECTORY_SAMPLES + 1);
        for i in 0..=TRAJECTORY_SAMPLES {
            let t = tof * i as f64 / TRAJECTORY_SAMPLES as f64;
            let pos = self.position_at(velocity, angle_degrees, t);
            if pos.y < 0.0 {
                // Last sample lands exactly on the ground up to rounding
                if pos.y > -1e-9 {
                    points.push(TrajectoryPoint { x: pos.x, y: 0.0, t });
                }
                break;
            }
            points.push(TrajectoryPoint { x: pos.x, y: pos.y, t });
        }
        points
    }

    /// Sample a straight-up launch until it reaches `target_height`, or until
    /// the apex when the target is out of reach.
    pub fn vertical_trajectory(&self, velocity: f64, target_height: f64) -> Vec<TrajectoryPoint> {
        let Some(g) = self.g() else { return Vec::new() };
        if !valid_speed(velocity) {
            return Vec::new();
        }
        let apex_time = velocity / g;
        let end = if target_height.is_finite()
            && target_height > 0.0
            && target_height <= self.max_height(velocity, None)
        {
            // Smaller root of h = v·t − ½·g·t²
            let disc = (velocity * velocity - 2.0 * g * target_height).max(0.0);
            (velocity - disc.sqrt()) / g
        } else {
            apex_time
        };

        (0..=TRAJECTORY_SAMPLES)
            .map(|i| {
                let t = end * i as f64 / TRAJECTORY_SAMPLES as f64;
                TrajectoryPoint {
                    x: 0.0,
                    y: self.vertical_position_at(velocity, t),
                    t,
                }
            })
            .collect()
    }

    /// Peak height: v²·sin²(θ)/(2g), or v²/(2g) when `angle_degrees` is None
    pub fn max_height(&self, velocity: f64, angle_degrees: Option<f64>) -> f64 {
        let Some(g) = self.g() else { return 0.0 };
        if !valid_speed(velocity) {
            return 0.0;
        }
        match angle_degrees {
            None => velocity * velocity / (2.0 * g),
            Some(angle) if valid_launch_angle(angle) => {
                let s = angle.to_radians().sin();
                velocity * velocity * s * s / (2.0 * g)
            }
            Some(_) => 0.0,
        }
    }

    /// Horizontal range back to launch height: v²·sin(2θ)/g
    pub fn range(&self, velocity: f64, angle_degrees: f64) -> f64 {
        let Some(g) = self.g() else { return 0.0 };
        if !valid_speed(velocity) || !valid_launch_angle(angle_degrees) {
            return 0.0;
        }
        velocity * velocity * (2.0 * angle_degrees.to_radians()).sin() / g
    }

    /// Launch speed that peaks exactly at `height`: sqrt(2·g·h)
    pub fn required_velocity_for_height(&self, height: f64) -> f64 {
        match self.g() {
            Some(g) if height.is_finite() && height > 0.0 => (2.0 * g * height).sqrt(),
            _ => 0.0,
        }
    }

    /// Speed remaining at `height` for a vertical launch at `v0`.
    /// Returns 0 when `height` is above the achievable peak.
    pub fn velocity_at_height(&self, v0: f64, height: f64) -> f64 {
        let Some(g) = self.g() else { return 0.0 };
        if !valid_speed(v0) || !height.is_finite() {
            return 0.0;
        }
        if height > self.max_height(v0, None) {
            return 0.0;
        }
        (v0 * v0 - 2.0 * g * height).abs().sqrt()
    }

    /// Launch speed that reaches `distance` at the given angle: sqrt(d·g / sin 2θ)
    pub fn required_velocity_for_range(&self, distance: f64, angle_degrees: f64) -> f64 {
        let Some(g) = self.g() else { return 0.0 };
        if !distance.is_finite() || distance <= 0.0 || !valid_launch_angle(angle_degrees) {
            return 0.0;
        }
        let s = (2.0 * angle_degrees.to_radians()).sin();
        if s <= 0.0 {
            return 0.0;
        }
        (distance * g / s).sqrt()
    }

    /// Low launch angle (degrees) that reaches `distance` at `velocity`,
    /// or None when the distance exceeds the maximum range.
    pub fn launch_angle_for_range(&self, velocity: f64, distance: f64) -> Option<f64> {
        let g = self.g()?;
        if !valid_speed(velocity) || !distance.is_finite() || distance <= 0.0 {
            return None;
        }
        let ratio = distance * g / (velocity * velocity);
        if ratio > 1.0 + FLOAT_EPSILON {
            return None;
        }
        Some(0.5 * ratio.min(1.0).asin().to_degrees())
    }

    /// Impact speed for a launch from ground level (equal to launch speed)
    pub fn landing_speed(&self, velocity: f64, angle_degrees: f64) -> f64 {
        let tof = self.time_of_flight(velocity, angle_degrees);
        self.velocity_at(velocity, angle_degrees, tof).length()
    }

    /// Time to fall `height` from rest: sqrt(2h/g)
    pub fn fall_time(&self, height: f64) -> f64 {
        match self.g() {
            Some(g) if height.is_finite() && height > 0.0 => (2.0 * height / g).sqrt(),
            _ => 0.0,
        }
    }

    /// Acceleration down a frictionless incline: g·sin(θ)
    pub fn incline_acceleration(&self, angle_degrees: f64) -> f64 {
        match self.g() {
            Some(g) if valid_launch_angle(angle_degrees) => g * angle_degrees.to_radians().sin(),
            _ => 0.0,
        }
    }

    /// Acceleration down an incline with kinetic friction: g·(sin θ − μ·cos θ),
    /// floored at 0 (a block that static-holds does not slide backwards).
    pub fn incline_acceleration_with_friction(&self, angle_degrees: f64, friction: f64) -> f64 {
        let Some(g) = self.g() else { return 0.0 };
        if !valid_launch_angle(angle_degrees) || !friction.is_finite() || friction < 0.0 {
            return 0.0;
        }
        let theta = angle_degrees.to_radians();
        (g * (theta.sin() - friction * theta.cos())).max(0.0)
    }

    /// Time to slide `ramp_length` from rest: sqrt(2L / (g·sin θ))
    pub fn time_to_bottom(&self, ramp_length: f64, angle_degrees: f64) -> f64 {
        let accel = self.incline_acceleration(angle_degrees);
        if !ramp_length.is_finite() || ramp_length <= 0.0 || accel <= 0.0 {
            return 0.0;
        }
        (2.0 * ramp_length / accel).sqrt()
    }
}

/// Linear momentum p = m·v
pub fn momentum(mass: f64, velocity: f64) -> f64 {
    if mass.is_finite() && velocity.is_finite() && mass > 0.0 {
        mass * velocity
    } else {
        0.0
    }
}

/// Kinetic energy ½·m·v²
pub fn kinetic_energy(mass: f64, velocity: f64) -> f64 {
    if mass.is_finite() && velocity.is_finite() && mass > 0.0 {
        0.5 * mass * velocity * velocity
    } else {
        0.0
    }
}

// Earth-gravity shorthands

pub fn trajectory(velocity: f64, angle_degrees: f64) -> Vec<TrajectoryPoint> {
    Kinematics::EARTH.trajectory(velocity, angle_degrees)
}

pub fn time_of_flight(velocity: f64, angle_degrees: f64) -> f64 {
    Kinematics::EARTH.time_of_flight(velocity, angle_degrees)
}

pub fn max_height(velocity: f64, angle_degrees: Option<f64>) -> f64 {
    Kinematics::EARTH.max_height(velocity, angle_degrees)
}

pub fn range(velocity: f64, angle_degrees: f64) -> f64 {
    Kinematics::EARTH.range(velocity, angle_degrees)
}

pub fn required_velocity_for_height(height: f64) -> f64 {
    Kinematics::EARTH.required_velocity_for_height(height)
}

pub fn velocity_at_height(v0: f64, height: f64) -> f64 {
    Kinematics::EARTH.velocity_at_height(v0, height)
}

pub fn incline_acceleration(angle_degrees: f64) -> f64 {
    Kinematics::EARTH.incline_acceleration(angle_degrees)
}

pub fn time_to_bottom(ramp_length: f64, angle_degrees: f64) -> f64 {
    Kinematics::EARTH.time_to_bottom(ramp_length, angle_degrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_complementary_angles_share_range() {
        for v in [15.0, 22.5, 35.0] {
            for a in [10.0, 20.0, 33.0, 44.0, 60.0, 75.0] {
                let r1 = range(v, a);
                let r2 = range(v, 90.0 - a);
                assert!((r1 - r2).abs() < 1e-9, "range({v},{a})={r1} vs {r2}");
            }
        }
    }

    #[test]
    fn test_45_degrees_maximizes_range() {
        let v = 25.0;
        let best = range(v, 45.0);
        for tenth in 1..900 {
            let a = tenth as f64 / 10.0;
            assert!(best >= range(v, a) - EPS, "angle {a} beat 45°");
        }
    }

    #[test]
    fn test_required_velocity_round_trips_through_max_height() {
        for h in [0.5, 20.0, 30.0, 50.0, 123.4] {
            let v = required_velocity_for_height(h);
            assert!((max_height(v, None) - h).abs() < 1e-9);
        }
    }

    #[test]
    fn test_archer_range_value() {
        // 25²·sin(90°)/9.81
        assert!((range(25.0, 45.0) - 63.710499490316).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(trajectory(0.0, 45.0).is_empty());
        assert!(trajectory(-3.0, 45.0).is_empty());
        assert!(trajectory(20.0, 0.0).is_empty());
        assert!(trajectory(20.0, 90.0).is_empty());
        assert!(trajectory(f64::NAN, 45.0).is_empty());
        assert_eq!(range(20.0, 95.0), 0.0);
        assert_eq!(range(0.0, 45.0), 0.0);
        assert_eq!(max_height(20.0, Some(90.0)), 0.0);
        assert_eq!(required_velocity_for_height(-1.0), 0.0);
        assert_eq!(time_to_bottom(10.0, 0.0), 0.0);
        assert_eq!(incline_acceleration(120.0), 0.0);
    }

    #[test]
    fn test_trajectory_stays_above_ground() {
        let points = trajectory(30.0, 60.0);
        assert!(points.len() > 100);
        assert_eq!(points[0].t, 0.0);
        assert!(points.iter().all(|p| p.y >= 0.0));
        let last = points.last().unwrap();
        assert!((last.t - time_of_flight(30.0, 60.0)).abs() < 1e-9);
        assert!((last.x - range(30.0, 60.0)).abs() < 1e-6);
        // Monotonic in time
        assert!(points.windows(2).all(|w| w[1].t > w[0].t));
    }

    #[test]
    fn test_vertical_trajectory_stops_at_target() {
        let k = Kinematics::EARTH;
        let points = k.vertical_trajectory(30.0, 20.0);
        let last = points.last().unwrap();
        assert!((last.y - 20.0).abs() < 1e-9);
        assert!(points.iter().all(|p| p.x == 0.0));

        // Unreachable target: stops at apex
        let points = k.vertical_trajectory(10.0, 100.0);
        let last = points.last().unwrap();
        assert!((last.y - k.max_height(10.0, None)).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_at_height() {
        let v0 = 20.0;
        assert!((velocity_at_height(v0, 0.0) - 20.0).abs() < EPS);
        let apex = max_height(v0, None);
        assert!(velocity_at_height(v0, apex) < 1e-6);
        assert_eq!(velocity_at_height(v0, apex + 1.0), 0.0);
        let expected = (400.0_f64 - 2.0 * 9.81 * 10.0).sqrt();
        assert!((velocity_at_height(v0, 10.0) - expected).abs() < EPS);
    }

    #[test]
    fn test_incline() {
        let a = incline_acceleration(30.0);
        assert!((a - 4.905).abs() < 1e-9);
        let t = time_to_bottom(10.0, 30.0);
        assert!((t - (20.0_f64 / 4.905).sqrt()).abs() < 1e-9);

        let k = Kinematics::EARTH;
        assert!((k.incline_acceleration_with_friction(30.0, 0.0) - a).abs() < EPS);
        // μ ≥ tan θ: does not slide
        assert_eq!(k.incline_acceleration_with_friction(30.0, 0.7), 0.0);
    }

    #[test]
    fn test_inverse_range_solutions() {
        let k = Kinematics::EARTH;
        let v = k.required_velocity_for_range(50.0, 30.0);
        assert!((k.range(v, 30.0) - 50.0).abs() < 1e-9);

        let angle = k.launch_angle_for_range(25.0, 40.0).unwrap();
        assert!(angle > 0.0 && angle <= 45.0);
        assert!((k.range(25.0, angle) - 40.0).abs() < 1e-9);

        // Out of reach
        assert!(k.launch_angle_for_range(10.0, 500.0).is_none());
    }

    #[test]
    fn test_landing_speed_matches_launch_speed() {
        let k = Kinematics::EARTH;
        assert!((k.landing_speed(20.0, 35.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_gravity() {
        let moon = Kinematics::new(1.62);
        assert!(moon.range(20.0, 45.0) > range(20.0, 45.0));
        assert_eq!(Kinematics::new(0.0).range(20.0, 45.0), 0.0);
    }

    #[test]
    fn test_momentum_and_energy() {
        assert_eq!(momentum(2.0, 3.0), 6.0);
        assert_eq!(kinetic_energy(2.0, 3.0), 9.0);
        assert_eq!(momentum(-1.0, 3.0), 0.0);
    }
}
