//! Success evaluation against a quest target
//!
//! Evaluates live or final [`SimulationState`]s against a target, producing a
//! [`ConstraintResult`] with a qualitative [`DirectionalHint`]. When both axes
//! miss, the horizontal hint wins.

use serde::{Deserialize, Serialize};

use crate::constants::FLOAT_EPSILON;
use crate::driver::{LaunchParams, SimulationState};
use crate::kinematics::{Kinematics, Point2};

/// Qualitative feedback for the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectionalHint {
    OnTarget,
    TooShort,
    TooFar,
    TooLow,
    TooHigh,
}

impl DirectionalHint {
    pub fn message(&self) -> &'static str {
        match self {
            DirectionalHint::OnTarget => "On target!",
            DirectionalHint::TooShort => "Too short",
            DirectionalHint::TooFar => "Too far",
            DirectionalHint::TooLow => "Too low",
            DirectionalHint::TooHigh => "Too high",
        }
    }

    /// Pick a hint from signed differences (achieved − target), horizontal first
    pub fn from_differences(dx: Option<f64>, dy: Option<f64>, tolerance_x: f64, tolerance_y: f64) -> Self {
        if let Some(dx) = dx {
            if dx < -tolerance_x {
                return DirectionalHint::TooShort;
            }
            if dx > tolerance_x {
                return DirectionalHint::TooFar;
            }
        }
        if let Some(dy) = dy {
            if dy < -tolerance_y {
                return DirectionalHint::TooLow;
            }
            if dy > tolerance_y {
                return DirectionalHint::TooHigh;
            }
        }
        DirectionalHint::OnTarget
    }
}

impl std::fmt::Display for DirectionalHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Outcome of checking a state against a target (never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintResult {
    /// State and target were finite and comparable
    pub is_valid: bool,
    pub within_tolerance: bool,
    /// Distance to target in the target's own unit
    pub error_magnitude: f64,
    pub hint: DirectionalHint,
}

impl ConstraintResult {
    fn invalid() -> Self {
        Self {
            is_valid: false,
            within_tolerance: false,
            error_magnitude: f64::INFINITY,
            hint: DirectionalHint::OnTarget,
        }
    }
}

/// Achieved vs required value, used for error percentages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub achieved: f64,
    pub required: f64,
}

/// Target evaluation strategy
pub trait TargetRule {
    /// Full check against the current state
    fn evaluate(&self, state: &SimulationState, params: &LaunchParams) -> ConstraintResult;

    /// Whether the run can end early because the target is satisfied now
    fn reached(&self, state: &SimulationState, params: &LaunchParams) -> bool;

    /// Scalar comparison recorded with each trial
    fn measure(&self, state: &SimulationState, params: &LaunchParams) -> Measurement;
}

/// Axis-aligned goal rectangle; edges may be given in either order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalZone {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl GoalZone {
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    fn x_bounds(&self) -> (f64, f64) {
        (self.left.min(self.right), self.left.max(self.right))
    }

    fn y_bounds(&self) -> (f64, f64) {
        (self.top.min(self.bottom), self.top.max(self.bottom))
    }

    pub fn contains(&self, point: Point2) -> bool {
        let (x0, x1) = self.x_bounds();
        let (y0, y1) = self.y_bounds();
        point.x >= x0 && point.x <= x1 && point.y >= y0 && point.y <= y1
    }

    pub fn center(&self) -> Point2 {
        Point2::new((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Euclidean distance from `point` to the rectangle (0 inside)
    pub fn distance_to(&self, point: Point2) -> f64 {
        let (x0, x1) = self.x_bounds();
        let (y0, y1) = self.y_bounds();
        let dx = (x0 - point.x).max(0.0).max(point.x - x1);
        let dy = (y0 - point.y).max(0.0).max(point.y - y1);
        dx.hypot(dy)
    }

    fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite() && self.top.is_finite() && self.bottom.is_finite()
    }
}

/// Every target shape a quest can set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Target {
    /// Land inside a rectangle; passing through it mid-flight does not count
    GoalZone(GoalZone),
    /// Peak height within tolerance
    Height { height: f64, tolerance: f64 },
    /// Travel (range, track distance) within tolerance
    Distance { distance: f64, tolerance: f64 },
    /// Run duration within tolerance
    Duration { seconds: f64, tolerance: f64 },
    /// Cross `height` AND choose a launch speed close to sqrt(2·g·h)
    VelocityMatch {
        height: f64,
        height_tolerance: f64,
        velocity_tolerance: f64,
        kinematics: Kinematics,
    },
}

impl Target {
    /// The primary target value (for display and error percentages)
    pub fn value(&self) -> f64 {
        match self {
            Target::GoalZone(zone) => zone.center().x,
            Target::Height { height, .. } => *height,
            Target::Distance { distance, .. } => *distance,
            Target::Duration { seconds, .. } => *seconds,
            Target::VelocityMatch { height, .. } => *height,
        }
    }

    /// Launch speed the velocity-matching gate compares against
    pub fn required_velocity(&self) -> Option<f64> {
        match self {
            Target::VelocityMatch { height, kinematics, .. } => {
                Some(kinematics.required_velocity_for_height(*height))
            }
            _ => None,
        }
    }

    fn passed_apex(state: &SimulationState) -> bool {
        state.t > 0.0 && state.velocity.y <= 0.0
    }
}

impl TargetRule for Target {
    fn evaluate(&self, state: &SimulationState, params: &LaunchParams) -> ConstraintResult {
        if !state.is_finite() {
            return ConstraintResult::invalid();
        }
        match *self {
            Target::GoalZone(zone) => {
                if !zone.is_finite() {
                    return ConstraintResult::invalid();
                }
                let point = state.position;
                let (x0, x1) = zone.x_bounds();
                let (y0, y1) = zone.y_bounds();
                let dx = if point.x < x0 {
                    Some(point.x - x0)
                } else if point.x > x1 {
                    Some(point.x - x1)
                } else {
                    Some(0.0)
                };
                let dy = if point.y < y0 {
                    Some(point.y - y0)
                } else if point.y > y1 {
                    Some(point.y - y1)
                } else {
                    Some(0.0)
                };
                ConstraintResult {
                    is_valid: true,
                    within_tolerance: zone.contains(point),
                    error_magnitude: zone.distance_to(point),
                    hint: DirectionalHint::from_differences(dx, dy, 0.0, 0.0),
                }
            }
            Target::Height { height, tolerance } => {
                scalar_result(state.max_height, height, tolerance, Axis::Vertical)
            }
            Target::Distance { distance, tolerance } => {
                scalar_result(state.travel, distance, tolerance, Axis::Horizontal)
            }
            Target::Duration { seconds, tolerance } => {
                scalar_result(state.t, seconds, tolerance, Axis::Horizontal)
            }
            Target::VelocityMatch {
                height,
                height_tolerance,
                velocity_tolerance,
                kinematics,
            } => {
                if !height.is_finite() || !params.velocity.is_finite() {
                    return ConstraintResult::invalid();
                }
                let required = kinematics.required_velocity_for_height(height);
                let dv = params.velocity - required;
                let crossed = state.max_height >= height - height_tolerance;
                let velocity_ok = dv.abs() <= velocity_tolerance;
                let hint = if dv > velocity_tolerance {
                    DirectionalHint::TooHigh
                } else if dv < -velocity_tolerance || !crossed {
                    DirectionalHint::TooLow
                } else {
                    DirectionalHint::OnTarget
                };
                ConstraintResult {
                    is_valid: true,
                    within_tolerance: crossed && velocity_ok,
                    error_magnitude: dv.abs(),
                    hint,
                }
            }
        }
    }

    fn reached(&self, state: &SimulationState, params: &LaunchParams) -> bool {
        match self {
            Target::Height { .. } | Target::VelocityMatch { .. } => {
                Self::passed_apex(state) && self.evaluate(state, params).within_tolerance
            }
            // Judged where the run ends
            Target::GoalZone(_) | Target::Distance { .. } | Target::Duration { .. } => false,
        }
    }

    fn measure(&self, state: &SimulationState, params: &LaunchParams) -> Measurement {
        match self {
            Target::GoalZone(zone) => Measurement {
                achieved: state.position.x,
                required: zone.center().x,
            },
            Target::Height { height, .. } => Measurement {
                achieved: state.max_height,
                required: *height,
            },
            Target::Distance { distance, .. } => Measurement {
                achieved: state.travel,
                required: *distance,
            },
            Target::Duration { seconds, .. } => Measurement {
                achieved: state.t,
                required: *seconds,
            },
            Target::VelocityMatch { .. } => Measurement {
                achieved: params.velocity,
                required: self.required_velocity().unwrap_or(0.0),
            },
        }
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn scalar_result(achieved: f64, target: f64, tolerance: f64, axis: Axis) -> ConstraintResult {
    if !achieved.is_finite() || !target.is_finite() || !tolerance.is_finite() {
        return ConstraintResult::invalid();
    }
    let diff = achieved - target;
    let tolerance = tolerance.max(0.0);
    let hint = match axis {
        Axis::Horizontal => DirectionalHint::from_differences(Some(diff), None, tolerance, 0.0),
        Axis::Vertical => DirectionalHint::from_differences(None, Some(diff), 0.0, tolerance),
    };
    ConstraintResult {
        is_valid: true,
        within_tolerance: diff.abs() <= tolerance + FLOAT_EPSILON,
        error_magnitude: diff.abs(),
        hint,
    }
}
