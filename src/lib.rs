//! Kinequest - physics and scoring engine for kinematics learning quests
//!
//! This crate provides the formula library, the frame-stepped simulation
//! driver, target evaluation, trial recording and assessments, plus a Bevy
//! plugin and headless tooling to host them.

// Physics core
pub mod constants;
pub mod driver;
pub mod kinematics;
pub mod motion;
pub mod target;

// Scoring
pub mod assessment;
pub mod trials;

// Quest runtime and hosting
pub mod events;
pub mod plugin;
pub mod quest;
pub mod simulation;
pub mod testing;

// Re-export commonly used types for convenience
pub use assessment::{
    Assessment, AssessmentError, AssessmentResult, ExpectedAnswer, Question, QuestionResult,
    TrialAggregate, parse_number,
};
pub use constants::*;
pub use driver::{
    DriverError, LaunchParams, ObserverId, RunOutcome, RunPhase, RunToken, SimulationDriver,
    SimulationState, TickStatus,
};
pub use events::{BusEvent, EventBus, QuestEvent, serialize_event, update_event_bus_time};
pub use kinematics::{Kinematics, Point2, TrajectoryPoint};
pub use motion::{
    FreeFall, InclineSlide, Integration, MomentumCart, Motion, MotionModel, Projectile,
    VerticalLaunch,
};
pub use plugin::{LiveRun, QuestInput, QuestPlugin, QuestSession};
pub use quest::{
    QUESTS_DIR, Quest, QuestConfig, QuestDatabase, QuestError, QuestKind, QuestSummary, TargetSpec,
    TargetValue,
};
pub use target::{ConstraintResult, DirectionalHint, GoalZone, Measurement, Target, TargetRule};
pub use trials::{
    AccuracyWeights, AngleBucket, Trial, TrialHistory, TrialMetric, TrialMetrics, accuracy_score,
    error_percent, range_accuracy,
};
