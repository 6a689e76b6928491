//! TOML scenario file parsing

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::assessment::Question;
use crate::driver::LaunchParams;
use crate::quest::TargetSpec;

/// Complete scenario definition from TOML file
#[derive(Debug, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    pub description: Option<String>,
    pub setup: TestSetup,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expect: TestExpectations,
}

/// Quest to load and the overrides applied to it
#[derive(Debug, Deserialize)]
pub struct TestSetup {
    /// Quest name or kind
    pub quest: String,
    pub seed: Option<u64>,
    #[serde(default = "default_fps")]
    pub fps: f64,
    pub target: Option<TargetSpec>,
    pub min_trials: Option<usize>,
    pub pass_threshold: Option<f64>,
    pub questions: Option<Vec<Question>>,
}

fn default_fps() -> f64 {
    60.0
}

fn default_mass() -> f64 {
    1.0
}

/// One scripted learner action
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    Launch {
        #[serde(default)]
        velocity: f64,
        #[serde(default)]
        angle: f64,
        #[serde(default = "default_mass")]
        mass: f64,
        #[serde(default)]
        height: f64,
        /// Press stop this many seconds after launch
        stop_at: Option<f64>,
    },
    Answer {
        question: String,
        answer: String,
    },
    Submit,
    Retake,
    NewRound,
}

impl Step {
    /// Launch parameters for a launch step
    pub fn launch_params(&self) -> Option<LaunchParams> {
        match self {
            Step::Launch {
                velocity,
                angle,
                mass,
                height,
                ..
            } => Some(LaunchParams {
                velocity: *velocity,
                angle_degrees: *angle,
                mass: *mass,
                height: *height,
            }),
            _ => None,
        }
    }
}

/// Expected scenario outcomes
#[derive(Debug, Default, Deserialize)]
pub struct TestExpectations {
    /// Events that must appear in this order (others may interleave)
    #[serde(default)]
    pub sequence: Vec<ExpectedEvent>,
    /// Checks against individual trials (uses [[expect.trial]] TOML syntax)
    #[serde(default)]
    pub trial: Vec<TrialAssertion>,
    /// Checks against quest state (uses [[expect.state]] TOML syntax)
    #[serde(default)]
    pub state: Vec<StateAssertion>,
}

/// Expected event in sequence
#[derive(Debug, Deserialize)]
pub struct ExpectedEvent {
    /// Two-letter event code (RS, RE, TR, ...)
    pub event: String,
    /// Substring the compact event line must contain
    pub contains: Option<String>,
    pub time_min_ms: Option<u32>,
    pub time_max_ms: Option<u32>,
}

/// Checks on one recorded trial
#[derive(Debug, Clone, Deserialize)]
pub struct TrialAssertion {
    /// 1-based trial number
    pub number: u32,
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Checks on quest state, after a given step or at the end
#[derive(Debug, Clone, Deserialize)]
pub struct StateAssertion {
    /// 1-based step index (None = after the last step)
    pub after_step: Option<usize>,
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Parse a scenario file from path
pub fn parse_test_file(path: &Path) -> Result<TestDefinition, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}
