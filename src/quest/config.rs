//! Quest configuration and presets

use bevy::log::warn;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::assessment::{Question, TrialAggregate};
use crate::constants::*;
use crate::driver::LaunchParams;
use crate::kinematics::Kinematics;
use crate::motion::{FreeFall, InclineSlide, MomentumCart, Motion, Projectile, VerticalLaunch};
use crate::target::{GoalZone, Target};
use crate::trials::{AccuracyWeights, TrialMetric};

/// The quest screens the engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestKind {
    /// Straight-up launch to a platform, velocity-matched
    #[default]
    RisingOrb,
    /// Angled launch at a distance target
    Archer,
    /// Angled launch into a goal rectangle
    GoalShot,
    /// Drop from a height, judged on fall time
    FreeFall,
    /// Block sliding down a ramp, judged on time to bottom
    Incline,
    /// Pushed cart with drag, judged on stopping distance
    MomentumCart,
}

impl QuestKind {
    pub const ALL: [QuestKind; 6] = [
        QuestKind::RisingOrb,
        QuestKind::Archer,
        QuestKind::GoalShot,
        QuestKind::FreeFall,
        QuestKind::Incline,
        QuestKind::MomentumCart,
    ];

    /// Parse kind from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-").replace(' ', "-");
        match normalized.as_str() {
            "rising-orb" | "risingorb" | "orb" | "vertical" => Some(QuestKind::RisingOrb),
            "archer" | "range" => Some(QuestKind::Archer),
            "goal-shot" | "goalshot" | "goal" => Some(QuestKind::GoalShot),
            "free-fall" | "freefall" | "drop" => Some(QuestKind::FreeFall),
            "incline" | "ramp" => Some(QuestKind::Incline),
            "momentum-cart" | "momentumcart" | "momentum" | "cart" => Some(QuestKind::MomentumCart),
            _ => None,
        }
    }

    /// Get the display name
    pub fn display_name(&self) -> &'static str {
        match self {
            QuestKind::RisingOrb => "Rising Orb",
            QuestKind::Archer => "Archer",
            QuestKind::GoalShot => "Goal Shot",
            QuestKind::FreeFall => "Free Fall",
            QuestKind::Incline => "Incline",
            QuestKind::MomentumCart => "Momentum Cart",
        }
    }

    /// Get the CLI name (used in --quest argument)
    pub fn cli_name(&self) -> &'static str {
        match self {
            QuestKind::RisingOrb => "rising-orb",
            QuestKind::Archer => "archer",
            QuestKind::GoalShot => "goal-shot",
            QuestKind::FreeFall => "free-fall",
            QuestKind::Incline => "incline",
            QuestKind::MomentumCart => "momentum-cart",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QuestKind::RisingOrb => "Pick the launch speed that just reaches the platform",
            QuestKind::Archer => "Pick speed and angle to hit a target at a set distance",
            QuestKind::GoalShot => "Land the ball inside the goal",
            QuestKind::FreeFall => "Predict how long a dropped ball takes to land",
            QuestKind::Incline => "Tilt the ramp so the block reaches the bottom on time",
            QuestKind::MomentumCart => "Push the cart so it stops at the marker",
        }
    }

    /// Observed pass threshold (percent) for this quest's assessment
    pub fn default_pass_threshold(&self) -> f64 {
        match self {
            QuestKind::RisingOrb => 70.0,
            QuestKind::Archer => 80.0,
            QuestKind::GoalShot => 60.0,
            QuestKind::FreeFall => 70.0,
            QuestKind::Incline => 85.0,
            QuestKind::MomentumCart => 80.0,
        }
    }

    /// Launch parameters the learner chooses in this quest
    pub fn controls(&self) -> LaunchControls {
        let none = LaunchControls::default();
        match self {
            QuestKind::RisingOrb => LaunchControls { velocity: true, ..none },
            QuestKind::Archer | QuestKind::GoalShot => LaunchControls {
                velocity: true,
                angle: true,
                ..none
            },
            QuestKind::FreeFall => LaunchControls { height: true, ..none },
            QuestKind::Incline => LaunchControls { angle: true, ..none },
            QuestKind::MomentumCart => LaunchControls {
                velocity: true,
                mass: true,
                ..none
            },
        }
    }

    /// Complete built-in configuration
    pub fn default_config(&self) -> QuestConfig {
        let mut config = QuestConfig {
            name: self.display_name().to_string(),
            kind: *self,
            gravity: GRAVITY,
            limits: LaunchLimits::default(),
            physics: PhysicsSettings::default(),
            target: TargetSpec::Distance {
                distance: TargetValue::Fixed(50.0),
                tolerance: DISTANCE_TOLERANCE,
            },
            pass_threshold: self.default_pass_threshold(),
            min_trials: DEFAULT_MIN_TRIALS,
            accuracy: None,
            seed: None,
            safety_cap: SAFETY_CAP_SECS,
            history_display: HISTORY_DISPLAY_LEN,
            questions: Vec::new(),
        };
        match self {
            QuestKind::RisingOrb => {
                config.target = TargetSpec::VelocityMatch {
                    height: TargetValue::OneOf {
                        one_of: PLATFORM_HEIGHTS.to_vec(),
                    },
                    height_tolerance: HEIGHT_TOLERANCE,
                    velocity_tolerance: VELOCITY_TOLERANCE,
                };
                config.questions = vec![
                    Question::choice(
                        "peak-speed",
                        "What is the orb's speed at the top of its flight?",
                        "zero",
                        &["zero", "the launch speed", "9.81 m/s"],
                    ),
                    Question::choice(
                        "double-height",
                        "To reach twice the height, the launch speed must be multiplied by...",
                        "sqrt(2)",
                        &["2", "sqrt(2)", "4"],
                    ),
                    Question::numeric(
                        "speed-for-20",
                        "Launch speed (m/s) needed to reach 20 m?",
                        Kinematics::EARTH.required_velocity_for_height(20.0),
                        0.5,
                    ),
                ];
            }
            QuestKind::Archer => {
                config.target = TargetSpec::Distance {
                    distance: TargetValue::OneOf {
                        one_of: vec![40.0, 50.0, 60.0, 70.0, 80.0],
                    },
                    tolerance: DISTANCE_TOLERANCE,
                };
                config.accuracy = Some(AccuracyWeights::default());
                config.questions = vec![
                    Question::choice("best-angle", "Which angle gives the longest range?", "45", &["30", "45", "60"])
                        .with_points(30.0),
                    Question::choice(
                        "complementary",
                        "Which angle lands at the same distance as 30 degrees?",
                        "60",
                        &["45", "60", "75"],
                    )
                    .with_points(25.0),
                    Question::choice(
                        "mass",
                        "Does a heavier arrow (no drag) travel a shorter distance?",
                        "no",
                        &["yes", "no"],
                    )
                    .with_points(25.0),
                    Question::from_trials(
                        "your-range",
                        "What was your average range (m)?",
                        TrialMetric::Distance,
                        TrialAggregate::Average,
                    )
                    .with_points(20.0),
                ];
            }
            QuestKind::GoalShot => {
                config.target = TargetSpec::GoalZone {
                    zone: GoalZone::new(45.0, 55.0, 6.0, 0.0),
                };
                config.accuracy = None;
                config.questions = vec![
                    Question::choice(
                        "horizontal",
                        "Which velocity component stays constant in flight?",
                        "horizontal",
                        &["horizontal", "vertical", "neither"],
                    ),
                    Question::choice(
                        "apex",
                        "At the highest point the vertical velocity is...",
                        "zero",
                        &["zero", "maximum", "negative"],
                    ),
                ];
            }
            QuestKind::FreeFall => {
                config.target = TargetSpec::Duration {
                    seconds: TargetValue::OneOf {
                        one_of: vec![1.5, 2.0, 2.5, 3.0],
                    },
                    tolerance: DURATION_TOLERANCE,
                };
                config.limits = LaunchLimits {
                    height_min: 1.0,
                    height_max: 60.0,
                    ..LaunchLimits::default()
                };
                config.questions = vec![
                    Question::numeric("g", "Acceleration of a falling ball (m/s²)?", GRAVITY, 0.1),
                    Question::choice(
                        "heavier",
                        "Does a heavier ball (no drag) land sooner?",
                        "no",
                        &["yes", "no"],
                    ),
                    Question::from_trials(
                        "your-time",
                        "How long did your last drop take (s)?",
                        TrialMetric::Time,
                        TrialAggregate::Latest,
                    ),
                ];
            }
            QuestKind::Incline => {
                config.target = TargetSpec::Duration {
                    seconds: TargetValue::OneOf {
                        one_of: vec![2.0, 2.5, 3.0],
                    },
                    tolerance: DURATION_TOLERANCE,
                };
                config.limits = LaunchLimits {
                    angle_min: 5.0,
                    angle_max: 60.0,
                    ..LaunchLimits::default()
                };
                config.questions = vec![
                    Question::from_trials(
                        "your-acceleration",
                        "What was your average acceleration (m/s²)?",
                        TrialMetric::Acceleration,
                        TrialAggregate::Average,
                    )
                    .with_points(30.0),
                    Question::choice(
                        "steeper",
                        "A steeper ramp makes the block accelerate...",
                        "faster",
                        &["faster", "slower", "the same"],
                    )
                    .with_points(25.0),
                    Question::choice(
                        "formula",
                        "Acceleration down a frictionless ramp is...",
                        "g sin",
                        &["g sin", "g cos", "g tan"],
                    )
                    .with_points(25.0),
                    Question::choice(
                        "friction",
                        "Adding friction makes the slide take...",
                        "longer",
                        &["longer", "shorter", "the same"],
                    )
                    .with_points(20.0),
                ];
            }
            QuestKind::MomentumCart => {
                config.target = TargetSpec::Distance {
                    distance: TargetValue::OneOf {
                        one_of: vec![10.0, 15.0, 20.0],
                    },
                    tolerance: 1.0,
                };
                config.limits = LaunchLimits {
                    velocity_min: 1.0,
                    velocity_max: 15.0,
                    ..LaunchLimits::default()
                };
                config.questions = vec![
                    Question::choice(
                        "momentum",
                        "Momentum is mass times...",
                        "velocity",
                        &["velocity", "acceleration", "distance"],
                    ),
                    Question::choice(
                        "heavier-cart",
                        "At the same push speed, a heavier cart carries more...",
                        "momentum",
                        &["momentum", "acceleration", "friction"],
                    ),
                    Question::from_trials(
                        "your-distance",
                        "How far did your carts roll on average (m)?",
                        TrialMetric::Distance,
                        TrialAggregate::Average,
                    ),
                ];
            }
        }
        config
    }
}

/// UI clamps for learner-chosen parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchLimits {
    pub velocity_min: f64,
    pub velocity_max: f64,
    pub angle_min: f64,
    pub angle_max: f64,
    pub mass_min: f64,
    pub mass_max: f64,
    pub height_min: f64,
    pub height_max: f64,
}

impl Default for LaunchLimits {
    fn default() -> Self {
        Self {
            velocity_min: VELOCITY_MIN,
            velocity_max: VELOCITY_MAX,
            angle_min: ANGLE_MIN,
            angle_max: ANGLE_MAX,
            mass_min: MASS_MIN,
            mass_max: MASS_MAX,
            height_min: 0.0,
            height_max: 100.0,
        }
    }
}

/// Which launch parameters a quest exposes to the learner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchControls {
    pub velocity: bool,
    pub angle: bool,
    pub mass: bool,
    pub height: bool,
}

impl LaunchLimits {
    /// Clamp the controlled parameters into range; non-finite values fall to
    /// the minimum. Uncontrolled ones pass through, or reset to the default
    /// when non-finite.
    pub fn clamp(&self, params: LaunchParams, controls: LaunchControls) -> LaunchParams {
        let neutral = LaunchParams::default();
        let pick = |controlled: bool, value: f64, min: f64, max: f64, fallback: f64| {
            if controlled {
                clamp_finite(value, min, max)
            } else if value.is_finite() {
                value
            } else {
                fallback
            }
        };
        LaunchParams {
            velocity: pick(
                controls.velocity,
                params.velocity,
                self.velocity_min,
                self.velocity_max,
                neutral.velocity,
            ),
            angle_degrees: pick(
                controls.angle,
                params.angle_degrees,
                self.angle_min,
                self.angle_max,
                neutral.angle_degrees,
            ),
            mass: pick(controls.mass, params.mass, self.mass_min, self.mass_max, neutral.mass),
            height: pick(
                controls.height,
                params.height,
                self.height_min,
                self.height_max,
                neutral.height,
            ),
        }
    }
}

fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if value.is_finite() { value.clamp(lo, hi) } else { lo }
}

/// Scene constants for models that need more than the launch parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    pub ramp_length: f64,
    pub friction: f64,
    pub drag: f64,
    pub rolling_friction: f64,
    pub track_length: f64,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            ramp_length: 10.0,
            friction: 0.0,
            drag: 0.05,
            rolling_friction: 0.05,
            track_length: 100.0,
        }
    }
}

/// Fixed target value or one drawn from a set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Fixed(f64),
    OneOf { one_of: Vec<f64> },
}

impl TargetValue {
    pub fn draw(&self, rng: &mut StdRng) -> f64 {
        match self {
            TargetValue::Fixed(value) => *value,
            TargetValue::OneOf { one_of } if !one_of.is_empty() => {
                one_of[rng.gen_range(0..one_of.len())]
            }
            TargetValue::OneOf { .. } => 0.0,
        }
    }

    /// Every value the generator can produce
    pub fn candidates(&self) -> Vec<f64> {
        match self {
            TargetValue::Fixed(value) => vec![*value],
            TargetValue::OneOf { one_of } => one_of.clone(),
        }
    }
}

/// Target definition with its generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TargetSpec {
    GoalZone {
        zone: GoalZone,
    },
    Height {
        height: TargetValue,
        tolerance: f64,
    },
    Distance {
        distance: TargetValue,
        tolerance: f64,
    },
    Duration {
        seconds: TargetValue,
        tolerance: f64,
    },
    VelocityMatch {
        height: TargetValue,
        height_tolerance: f64,
        velocity_tolerance: f64,
    },
}

impl TargetSpec {
    /// Draw a concrete target
    pub fn generate(&self, rng: &mut StdRng, kinematics: Kinematics) -> Target {
        match self {
            TargetSpec::GoalZone { zone } => Target::GoalZone(*zone),
            TargetSpec::Height { height, tolerance } => Target::Height {
                height: height.draw(rng),
                tolerance: *tolerance,
            },
            TargetSpec::Distance { distance, tolerance } => Target::Distance {
                distance: distance.draw(rng),
                tolerance: *tolerance,
            },
            TargetSpec::Duration { seconds, tolerance } => Target::Duration {
                seconds: seconds.draw(rng),
                tolerance: *tolerance,
            },
            TargetSpec::VelocityMatch {
                height,
                height_tolerance,
                velocity_tolerance,
            } => Target::VelocityMatch {
                height: height.draw(rng),
                height_tolerance: *height_tolerance,
                velocity_tolerance: *velocity_tolerance,
                kinematics,
            },
        }
    }

    /// One concrete target per generator value
    pub fn all_targets(&self, kinematics: Kinematics) -> Vec<Target> {
        let values = match self {
            TargetSpec::GoalZone { zone } => return vec![Target::GoalZone(*zone)],
            TargetSpec::Height { height, .. } => height.candidates(),
            TargetSpec::Distance { distance, .. } => distance.candidates(),
            TargetSpec::Duration { seconds, .. } => seconds.candidates(),
            TargetSpec::VelocityMatch { height, .. } => height.candidates(),
        };
        values
            .into_iter()
            .map(|value| self.with_value(value, kinematics))
            .collect()
    }

    fn with_value(&self, value: f64, kinematics: Kinematics) -> Target {
        let fixed = match self {
            TargetSpec::GoalZone { zone } => TargetSpec::GoalZone { zone: *zone },
            TargetSpec::Height { tolerance, .. } => TargetSpec::Height {
                height: TargetValue::Fixed(value),
                tolerance: *tolerance,
            },
            TargetSpec::Distance { tolerance, .. } => TargetSpec::Distance {
                distance: TargetValue::Fixed(value),
                tolerance: *tolerance,
            },
            TargetSpec::Duration { tolerance, .. } => TargetSpec::Duration {
                seconds: TargetValue::Fixed(value),
                tolerance: *tolerance,
            },
            TargetSpec::VelocityMatch {
                height_tolerance,
                velocity_tolerance,
                ..
            } => TargetSpec::VelocityMatch {
                height: TargetValue::Fixed(value),
                height_tolerance: *height_tolerance,
                velocity_tolerance: *velocity_tolerance,
            },
        };
        // A fixed generator never touches the rng
        let mut rng = <StdRng as rand::SeedableRng>::seed_from_u64(0);
        fixed.generate(&mut rng, kinematics)
    }

    fn tolerances(&self) -> Vec<f64> {
        match self {
            TargetSpec::GoalZone { .. } => Vec::new(),
            TargetSpec::Height { tolerance, .. }
            | TargetSpec::Distance { tolerance, .. }
            | TargetSpec::Duration { tolerance, .. } => vec![*tolerance],
            TargetSpec::VelocityMatch {
                height_tolerance,
                velocity_tolerance,
                ..
            } => vec![*height_tolerance, *velocity_tolerance],
        }
    }
}

fn default_gravity() -> f64 {
    GRAVITY
}

fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

fn default_min_trials() -> usize {
    DEFAULT_MIN_TRIALS
}

fn default_safety_cap() -> f64 {
    SAFETY_CAP_SECS
}

fn default_history_display() -> usize {
    HISTORY_DISPLAY_LEN
}

/// Everything one quest instance needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestConfig {
    pub name: String,
    pub kind: QuestKind,
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    #[serde(default)]
    pub limits: LaunchLimits,
    #[serde(default)]
    pub physics: PhysicsSettings,
    pub target: TargetSpec,
    /// Percent score needed to pass the assessment
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// Trials required before the assessment is offered
    #[serde(default = "default_min_trials")]
    pub min_trials: usize,
    /// Parameter accuracy scoring for range quests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracyWeights>,
    /// Target generator seed (entropy when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_safety_cap")]
    pub safety_cap: f64,
    #[serde(default = "default_history_display")]
    pub history_display: usize,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Default for QuestConfig {
    fn default() -> Self {
        QuestKind::default().default_config()
    }
}

impl QuestConfig {
    /// Load a quest from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn kinematics(&self) -> Kinematics {
        Kinematics::new(self.gravity)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Apply the UI clamps to the parameters this quest's learner controls
    pub fn clamp_params(&self, params: LaunchParams) -> LaunchParams {
        self.limits.clamp(params, self.kind.controls())
    }

    /// Build the motion model for learner-chosen parameters (already clamped)
    pub fn motion_for(&self, params: &LaunchParams) -> Motion {
        let k = self.kinematics();
        let p = &self.physics;
        match self.kind {
            QuestKind::RisingOrb => Motion::Vertical(VerticalLaunch::new(params.velocity, k)),
            QuestKind::Archer | QuestKind::GoalShot => {
                Motion::Projectile(Projectile::new(params.velocity, params.angle_degrees, k))
            }
            QuestKind::FreeFall => Motion::FreeFall(FreeFall::new(params.height, k)),
            QuestKind::Incline => Motion::Incline(InclineSlide::new(
                p.ramp_length,
                params.angle_degrees,
                p.friction,
                k,
            )),
            QuestKind::MomentumCart => Motion::Cart(
                MomentumCart::new(params.mass, params.velocity, k)
                    .with_drag(p.drag, p.rolling_friction)
                    .with_track_length(p.track_length),
            ),
        }
    }

    /// Problems worth warning about; an empty list means the config is sound
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.gravity.is_finite() && self.gravity > 0.0) {
            problems.push(format!("gravity must be positive, got {}", self.gravity));
        }
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            problems.push(format!(
                "pass_threshold {} outside 0-100",
                self.pass_threshold
            ));
        }
        let l = &self.limits;
        for (name, lo, hi) in [
            ("velocity", l.velocity_min, l.velocity_max),
            ("angle", l.angle_min, l.angle_max),
            ("mass", l.mass_min, l.mass_max),
            ("height", l.height_min, l.height_max),
        ] {
            if lo > hi {
                problems.push(format!("{} limits reversed: {} > {}", name, lo, hi));
            }
        }
        if self.target.tolerances().iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
            problems.push("tolerances must be finite and non-negative".to_string());
        }
        if self.questions.is_empty() {
            problems.push("no assessment questions; every submission passes".to_string());
        }
        let mut ids: Vec<&str> = self.questions.iter().map(|q| q.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.questions.len() {
            problems.push("duplicate question ids".to_string());
        }
        for value in crate::simulation::unreachable_targets(self) {
            problems.push(format!("target {} is unreachable within the launch limits", value));
        }
        problems
    }

    /// Validate and log every problem found
    pub fn warn_if_invalid(&self) -> bool {
        let problems = self.validate();
        for problem in &problems {
            warn!("Quest '{}': {}", self.name, problem);
        }
        problems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_kind_parsing() {
        for kind in QuestKind::ALL {
            assert_eq!(QuestKind::from_str(kind.cli_name()), Some(kind));
            assert_eq!(QuestKind::from_str(kind.display_name()), Some(kind));
        }
        assert_eq!(QuestKind::from_str("bogus"), None);
    }

    #[test]
    fn test_presets_are_valid() {
        for kind in QuestKind::ALL {
            let config = kind.default_config();
            let problems = config.validate();
            assert!(problems.is_empty(), "{}: {:?}", kind.display_name(), problems);
        }
    }

    #[test]
    fn test_pass_thresholds_per_kind() {
        let thresholds: Vec<f64> = QuestKind::ALL
            .iter()
            .map(|k| k.default_config().pass_threshold)
            .collect();
        for observed in [60.0, 70.0, 80.0, 85.0] {
            assert!(thresholds.contains(&observed));
        }
    }

    #[test]
    fn test_seeded_generator_is_deterministic() {
        let spec = QuestKind::RisingOrb.default_config().target;
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..5)
                .map(|_| spec.generate(&mut rng, Kinematics::EARTH).value())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
        for value in draw(7) {
            assert!(PLATFORM_HEIGHTS.contains(&value));
        }
    }

    #[test]
    fn test_limits_clamp() {
        let limits = LaunchLimits::default();
        let controls = QuestKind::Archer.controls();
        let clamped = limits.clamp(LaunchParams::angled(50.0, 5.0), controls);
        assert_eq!(clamped.velocity, VELOCITY_MAX);
        assert_eq!(clamped.angle_degrees, ANGLE_MIN);
        let nan = limits.clamp(LaunchParams::angled(f64::NAN, 45.0), controls);
        assert_eq!(nan.velocity, VELOCITY_MIN);
    }

    #[test]
    fn test_limits_only_touch_controlled_fields() {
        let fall = QuestKind::FreeFall.default_config();
        let dropped = fall.clamp_params(LaunchParams::dropped(19.62));
        assert_eq!(dropped.velocity, 0.0);
        assert_eq!(dropped.angle_degrees, 0.0);
        assert_eq!(dropped.height, 19.62);

        let cart = QuestKind::MomentumCart.default_config();
        let pushed = cart.clamp_params(LaunchParams::angled(99.0, 0.0).with_mass(2.0));
        assert_eq!(pushed.velocity, cart.limits.velocity_max);
        assert_eq!(pushed.angle_degrees, 0.0);
        assert_eq!(pushed.mass, 2.0);

        let orb = QuestKind::RisingOrb.default_config();
        let vertical = orb.clamp_params(LaunchParams::vertical(24.26));
        assert_eq!(vertical.angle_degrees, 90.0);
        let junk = orb.clamp_params(LaunchParams::angled(24.26, f64::NAN));
        assert_eq!(junk.angle_degrees, 0.0);
    }

    #[test]
    fn test_parse_toml_config() {
        let config = QuestConfig::parse(
            r#"
name = "Orb Practice"
kind = "rising-orb"
pass_threshold = 60.0
seed = 3

[target]
type = "velocity-match"
height = { one_of = [20.0, 30.0] }
height_tolerance = 0.5
velocity_tolerance = 0.5

[[questions]]
id = "peak"
prompt = "Speed at the top?"
expected = { kind = "choice", correct = "zero" }
"#,
        )
        .unwrap();
        assert_eq!(config.kind, QuestKind::RisingOrb);
        assert_eq!(config.gravity, GRAVITY);
        assert_eq!(config.min_trials, DEFAULT_MIN_TRIALS);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.questions.len(), 1);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_flags_unreachable_target() {
        let mut config = QuestKind::Archer.default_config();
        config.target = TargetSpec::Distance {
            distance: TargetValue::Fixed(500.0),
            tolerance: 1.0,
        };
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("unreachable")));
    }
}
