//! Run inputs, live state and the run state machine

use serde::{Deserialize, Serialize};

use crate::kinematics::Point2;

/// Immutable inputs for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaunchParams {
    /// Launch or push speed (m/s)
    pub velocity: f64,
    /// Launch or ramp angle (degrees)
    #[serde(default)]
    pub angle_degrees: f64,
    /// Body mass (kg), used by momentum quests
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Release height (m), used by free-fall quests
    #[serde(default)]
    pub height: f64,
}

fn default_mass() -> f64 {
    1.0
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            velocity: 0.0,
            angle_degrees: 0.0,
            mass: default_mass(),
            height: 0.0,
        }
    }
}

impl LaunchParams {
    /// Angled launch
    pub fn angled(velocity: f64, angle_degrees: f64) -> Self {
        Self {
            velocity,
            angle_degrees,
            ..Default::default()
        }
    }

    /// Straight-up launch
    pub fn vertical(velocity: f64) -> Self {
        Self {
            velocity,
            angle_degrees: 90.0,
            ..Default::default()
        }
    }

    /// Release from rest
    pub fn dropped(height: f64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }
}

/// Mutable state owned by the driver for the duration of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Seconds since launch (never past the model's end time)
    pub t: f64,
    pub position: Point2,
    pub velocity: Point2,
    /// Highest y seen so far
    pub max_height: f64,
    /// Distance along the model's main axis (range, ramp length, track)
    pub travel: f64,
}

impl SimulationState {
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    pub fn is_finite(&self) -> bool {
        self.t.is_finite()
            && self.position.is_finite()
            && self.velocity.is_finite()
            && self.max_height.is_finite()
            && self.travel.is_finite()
    }
}

/// Driver state machine: Idle → Running → terminal → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    /// Hit the terminal boundary (ground, foot of ramp, rest)
    Landed,
    /// Target satisfied mid-run
    TargetReached,
    /// Safety cap elapsed
    TimedOut,
    /// Cancelled from outside
    Stopped,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Landed | RunPhase::TargetReached | RunPhase::TimedOut | RunPhase::Stopped
        )
    }

    /// Parse phase from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-").replace(' ', "-");
        match normalized.as_str() {
            "idle" => Some(RunPhase::Idle),
            "running" => Some(RunPhase::Running),
            "landed" => Some(RunPhase::Landed),
            "target-reached" | "targetreached" | "reached" => Some(RunPhase::TargetReached),
            "timed-out" | "timedout" | "timeout" => Some(RunPhase::TimedOut),
            "stopped" => Some(RunPhase::Stopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Landed => "landed",
            RunPhase::TargetReached => "target-reached",
            RunPhase::TimedOut => "timed-out",
            RunPhase::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}
