//! Tunable constants for kinequest
//!
//! All physics and scoring defaults live here; quest configs override them.

// =============================================================================
// PHYSICS CONSTANTS
// =============================================================================

pub const GRAVITY: f64 = 9.81; // m/s², fixed for every quest
pub const TRAJECTORY_SAMPLES: usize = 150; // Preview points per trajectory
pub const FIXED_DT: f64 = 1.0 / 60.0; // Integration step for non-analytic models
pub const MAX_STEPS_PER_TICK: usize = 600; // Per-tick catch-up bound after a stall; later ticks and stop() finish the rest
pub const FLOAT_EPSILON: f64 = 1e-9;

// =============================================================================
// DRIVER CONSTANTS
// =============================================================================

pub const SAFETY_CAP_SECS: f64 = 30.0; // Hard stop for any run
pub const ELAPSED_DISPLAY_INTERVAL: f64 = 0.1; // Elapsed readout refresh (independent of physics)

// =============================================================================
// UI CLAMPS (defaults, overridable per quest)
// =============================================================================

pub const VELOCITY_MIN: f64 = 15.0;
pub const VELOCITY_MAX: f64 = 35.0;
pub const ANGLE_MIN: f64 = 20.0;
pub const ANGLE_MAX: f64 = 70.0;
pub const MASS_MIN: f64 = 0.5;
pub const MASS_MAX: f64 = 10.0;

// =============================================================================
// TARGETS AND TOLERANCES
// =============================================================================

pub const PLATFORM_HEIGHTS: [f64; 7] = [20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0];
pub const HEIGHT_TOLERANCE: f64 = 0.5; // m, spatial gate for rising-orb crossings
pub const VELOCITY_TOLERANCE: f64 = 0.5; // m/s, parametric gate for rising-orb
pub const DISTANCE_TOLERANCE: f64 = 2.5; // m, archer-style range targets
pub const DURATION_TOLERANCE: f64 = 0.25; // s, incline timing targets
pub const TRIAL_ANSWER_TOLERANCE: f64 = 1.0; // ± units for answers derived from trial data

// =============================================================================
// SCORING
// =============================================================================

pub const ACCURACY_VELOCITY_WEIGHT: f64 = 0.6;
pub const ACCURACY_ANGLE_WEIGHT: f64 = 0.4;
pub const ACCURACY_MAX_VELOCITY_DIFF: f64 = 10.0; // m/s off ideal that scores zero
pub const ACCURACY_MAX_ANGLE_DIFF: f64 = 25.0; // degrees off ideal that scores zero
pub const DEFAULT_PASS_THRESHOLD: f64 = 70.0;
pub const DEFAULT_MIN_TRIALS: usize = 3;
pub const HISTORY_DISPLAY_LEN: usize = 5; // Rows a front end shows from the history
