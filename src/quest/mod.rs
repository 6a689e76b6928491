//! Quest runtime: driver → trial recorder → assessment → completion
//!
//! A [`Quest`] is one quest screen. It owns the simulation driver, the trial
//! history and the assessment, draws targets from the configured generator
//! and invokes the completion callback exactly once, the first time the
//! assessment is passed.

mod config;
mod database;
mod summary;

pub use config::{LaunchControls, LaunchLimits, PhysicsSettings, QuestConfig, QuestKind, TargetSpec, TargetValue};
pub use database::{QUESTS_DIR, QuestDatabase};
pub use summary::{QuestSummary, print_quest_summary};

use bevy::log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::assessment::{Assessment, AssessmentError, AssessmentResult};
use crate::driver::{
    DriverError, LaunchParams, RunOutcome, RunPhase, RunToken, SimulationDriver, SimulationState,
    TickStatus,
};
use crate::events::QuestEvent;
use crate::kinematics::{Kinematics, TrajectoryPoint};
use crate::motion::Motion;
use crate::target::{ConstraintResult, Target};
use crate::trials::{Trial, TrialHistory, range_accuracy};

/// Rejected quest operations (state is left untouched)
#[derive(Debug, Clone, PartialEq)]
pub enum QuestError {
    NotEnoughTrials { recorded: usize, required: usize },
    AssessmentNotOpen,
    Driver(DriverError),
    Assessment(AssessmentError),
}

impl std::fmt::Display for QuestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestError::NotEnoughTrials { recorded, required } => write!(
                f,
                "assessment needs {} trials, only {} recorded",
                required, recorded
            ),
            QuestError::AssessmentNotOpen => write!(f, "assessment is not open"),
            QuestError::Driver(e) => write!(f, "{}", e),
            QuestError::Assessment(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for QuestError {}

impl From<DriverError> for QuestError {
    fn from(e: DriverError) -> Self {
        QuestError::Driver(e)
    }
}

impl From<AssessmentError> for QuestError {
    fn from(e: AssessmentError) -> Self {
        QuestError::Assessment(e)
    }
}

type CompletionHook = Box<dyn FnOnce() + Send + Sync>;

/// One quest screen's engine
pub struct Quest {
    config: QuestConfig,
    kinematics: Kinematics,
    driver: SimulationDriver<Motion, Target>,
    history: TrialHistory,
    assessment: Option<Assessment>,
    rng: StdRng,
    round: u32,
    completed: bool,
    on_complete: Option<CompletionHook>,
    events: Vec<QuestEvent>,
}

impl Quest {
    pub fn new(config: QuestConfig) -> Self {
        let kinematics = config.kinematics();
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let target = config.target.generate(&mut rng, kinematics);
        let driver = SimulationDriver::new(target).with_safety_cap(config.safety_cap);

        info!(
            "Quest '{}' ({}) ready, target {:.2}",
            config.name,
            config.kind.cli_name(),
            target.value()
        );
        let events = vec![
            QuestEvent::QuestLoaded {
                quest: config.name.clone(),
                kind: config.kind.cli_name().to_string(),
                seed: config.seed,
            },
            QuestEvent::TargetDrawn {
                round: 1,
                value: target.value(),
            },
        ];

        Self {
            config,
            kinematics,
            driver,
            history: TrialHistory::new(),
            assessment: None,
            rng,
            round: 1,
            completed: false,
            on_complete: None,
            events,
        }
    }

    /// Register the completion callback (replaces any previous one)
    pub fn on_complete(&mut self, callback: impl FnOnce() + Send + Sync + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn config(&self) -> &QuestConfig {
        &self.config
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    pub fn target(&self) -> &Target {
        self.driver.target()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn history(&self) -> &TrialHistory {
        &self.history
    }

    /// The rows a front end shows
    pub fn history_window(&self) -> &[Trial] {
        self.history.recent(self.config.history_display)
    }

    pub fn driver(&self) -> &SimulationDriver<Motion, Target> {
        &self.driver
    }

    /// Mutable driver access, for state observers
    pub fn driver_mut(&mut self) -> &mut SimulationDriver<Motion, Target> {
        &mut self.driver
    }

    pub fn phase(&self) -> RunPhase {
        self.driver.phase()
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    pub fn state(&self) -> Option<&SimulationState> {
        self.driver.state()
    }

    pub fn token(&self) -> Option<RunToken> {
        self.driver.token()
    }

    /// Live feedback for the current run
    pub fn live_feedback(&self) -> Option<ConstraintResult> {
        self.driver.evaluate()
    }

    pub fn assessment(&self) -> Option<&Assessment> {
        self.assessment.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Events queued since the last call
    pub fn take_events(&mut self) -> Vec<QuestEvent> {
        std::mem::take(&mut self.events)
    }

    /// Trajectory preview for the given parameters (clamped like a launch)
    pub fn preview(&self, params: LaunchParams) -> Vec<TrajectoryPoint> {
        let params = self.config.clamp_params(params);
        match self.config.kind {
            QuestKind::RisingOrb => self
                .kinematics
                .vertical_trajectory(params.velocity, self.target().value()),
            QuestKind::Archer | QuestKind::GoalShot => self
                .kinematics
                .trajectory(params.velocity, params.angle_degrees),
            _ => Vec::new(),
        }
    }

    /// Start a run at host time `now`; rejected while one is running
    pub fn launch(&mut self, params: LaunchParams, now: f64) -> Result<RunToken, QuestError> {
        let params = self.config.clamp_params(params);
        let motion = self.config.motion_for(&params);
        match self.driver.start(motion, params, now) {
            Ok(token) => {
                info!(
                    "Run {} launched: v={:.2} angle={:.1} mass={:.2}",
                    token.generation(),
                    params.velocity,
                    params.angle_degrees,
                    params.mass
                );
                self.events.push(QuestEvent::RunStart {
                    run: token.generation(),
                    velocity: params.velocity,
                    angle: params.angle_degrees,
                    mass: params.mass,
                });
                Ok(token)
            }
            Err(e) => Err(self.reject("launch", e.into())),
        }
    }

    /// Frame callback for `token`; records the trial when the run finishes
    pub fn tick(&mut self, token: RunToken, now: f64) -> TickStatus {
        let status = self.driver.tick(token, now);
        if let TickStatus::Finished(outcome) = &status {
            self.record(outcome);
        }
        status
    }

    /// Tick the current run, if any
    pub fn frame(&mut self, now: f64) -> TickStatus {
        match self.driver.token() {
            Some(token) => self.tick(token, now),
            None => TickStatus::Stale,
        }
    }

    /// Cancel the run, recording a partial (unsuccessful) trial
    pub fn stop(&mut self, now: f64) -> Result<Trial, QuestError> {
        match self.driver.stop(now) {
            Ok(outcome) => Ok(self.record(&outcome)),
            Err(e) => Err(self.reject("stop", e.into())),
        }
    }

    /// Return to the initial pose; rejected while running
    pub fn reset(&mut self) -> Result<(), QuestError> {
        self.driver.reset().map_err(|e| self.reject("reset", e.into()))
    }

    /// Draw a fresh target for another round; rejected while running
    pub fn new_round(&mut self) -> Result<Target, QuestError> {
        if self.driver.is_running() {
            return Err(self.reject("new-round", DriverError::AlreadyRunning.into()));
        }
        let target = self.config.target.generate(&mut self.rng, self.kinematics);
        self.driver.set_target(target)?;
        self.driver.reset()?;
        self.round += 1;
        info!("Round {}: target {:.2}", self.round, target.value());
        self.events.push(QuestEvent::TargetDrawn {
            round: self.round,
            value: target.value(),
        });
        Ok(target)
    }

    /// Whether enough trials exist for the assessment to be offered
    pub fn assessment_available(&self) -> bool {
        self.history.len() >= self.config.min_trials
    }

    /// Offer the assessment (idempotent once open)
    pub fn open_assessment(&mut self) -> Result<&Assessment, QuestError> {
        if self.assessment.is_none() {
            if !self.assessment_available() {
                let err = QuestError::NotEnoughTrials {
                    recorded: self.history.len(),
                    required: self.config.min_trials,
                };
                return Err(self.reject("open-assessment", err));
            }
            let assessment = Assessment::new(self.config.questions.clone(), self.config.pass_threshold);
            self.events.push(QuestEvent::AssessmentOpened {
                questions: assessment.questions().len(),
            });
            self.assessment = Some(assessment);
        }
        self.assessment.as_ref().ok_or(QuestError::AssessmentNotOpen)
    }

    pub fn answer(&mut self, question_id: &str, answer: impl Into<String>) -> Result<(), QuestError> {
        let result = match self.assessment.as_mut() {
            Some(assessment) => assessment.answer(question_id, answer).map_err(QuestError::from),
            None => Err(QuestError::AssessmentNotOpen),
        };
        result.map_err(|e| self.reject("answer", e))
    }

    /// Grade the assessment; a pass completes the quest
    pub fn submit_assessment(&mut self) -> Result<AssessmentResult, QuestError> {
        let result = match self.assessment.as_mut() {
            Some(assessment) => assessment
                .submit(&self.history)
                .cloned()
                .map_err(QuestError::from),
            None => Err(QuestError::AssessmentNotOpen),
        };
        let result = result.map_err(|e| self.reject("submit", e))?;
        self.events.push(QuestEvent::AssessmentSubmitted {
            score: result.score,
            passed: result.passed,
        });
        if result.passed {
            self.complete();
        }
        Ok(result)
    }

    /// Clear the assessment for another attempt; trial history is kept
    pub fn retake(&mut self) -> Result<(), QuestError> {
        let Some(assessment) = self.assessment.as_mut() else {
            return Err(self.reject("retake", QuestError::AssessmentNotOpen));
        };
        assessment.retake();
        let attempt = assessment.attempts() + 1;
        self.events.push(QuestEvent::AssessmentRetake { attempt });
        Ok(())
    }

    pub fn summary(&self) -> QuestSummary {
        QuestSummary::from_quest(self)
    }

    /// Cancel every scheduled callback (screen teardown)
    pub fn teardown(&mut self) {
        self.driver.teardown();
    }

    fn record(&mut self, outcome: &RunOutcome) -> Trial {
        let accuracy = match (self.config.accuracy, self.driver.target()) {
            (Some(weights), Target::Distance { distance, .. })
                if matches!(self.config.kind, QuestKind::Archer | QuestKind::GoalShot) =>
            {
                Some(range_accuracy(&self.kinematics, &outcome.params, *distance, &weights))
            }
            _ => None,
        };
        let trial = self.history.record(outcome, accuracy).clone();
        info!(
            "Trial {} recorded: {} error {:.1}% {}",
            trial.trial_number,
            outcome.phase,
            trial.error_percent,
            if trial.success { "HIT" } else { "MISS" }
        );
        self.events.push(QuestEvent::RunEnd {
            run: outcome.run,
            phase: outcome.phase.to_string(),
            t: outcome.state.t,
            success: trial.success,
        });
        self.events.push(QuestEvent::TrialRecorded {
            trial_number: trial.trial_number,
            error_percent: trial.error_percent,
            success: trial.success,
        });
        trial
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        info!("Quest '{}' complete", self.config.name);
        self.events.push(QuestEvent::QuestComplete {
            quest: self.config.name.clone(),
        });
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }

    fn reject(&mut self, command: &str, error: QuestError) -> QuestError {
        warn!("Rejected {}: {}", command, error);
        self.events.push(QuestEvent::rejected(command, &error));
        error
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::assessment::Question;
    use crate::trials::TrialMetric;

    const FRAME: f64 = 1.0 / 60.0;

    fn run_to_end(quest: &mut Quest, params: LaunchParams, start: f64) -> Trial {
        let token = quest.launch(params, start).unwrap();
        let mut now = start;
        loop {
            now += FRAME;
            if let TickStatus::Finished(_) = quest.tick(token, now) {
                break;
            }
            assert!(now - start < 60.0, "run never finished");
        }
        quest.history().last().cloned().unwrap()
    }

    fn archer_quest(distance: f64) -> Quest {
        let mut config = QuestKind::Archer.default_config().with_seed(1);
        config.target = TargetSpec::Distance {
            distance: TargetValue::Fixed(distance),
            tolerance: 2.5,
        };
        Quest::new(config)
    }

    fn quiz_config(threshold: f64) -> QuestConfig {
        let mut config = archer_quest(50.0).config().clone();
        config.pass_threshold = threshold;
        config.questions = vec![
            Question::choice("q1", "1", "a", &["a", "b"]),
            Question::choice("q2", "2", "a", &["a", "b"]),
            Question::choice("q3", "3", "a", &["a", "b"]),
            Question::choice("q4", "4", "a", &["a", "b"]),
        ];
        config
    }

    #[test]
    fn test_archer_trial_hits() {
        let k = Kinematics::EARTH;
        let mut quest = archer_quest(k.range(25.0, 45.0));
        let trial = run_to_end(&mut quest, LaunchParams::angled(25.0, 45.0), 0.0);
        assert!(trial.success);
        assert!(trial.error_percent < 1e-9);
        assert!((trial.accuracy.unwrap() - 100.0).abs() < 1e-6);
        assert_eq!(trial.trial_number, 1);
    }

    #[test]
    fn test_params_are_clamped() {
        let mut quest = archer_quest(50.0);
        let trial = run_to_end(&mut quest, LaunchParams::angled(99.0, 89.0), 0.0);
        assert_eq!(trial.params.velocity, 35.0);
        assert_eq!(trial.params.angle_degrees, 70.0);
    }

    #[test]
    fn test_assessment_gated_by_trials() {
        let mut quest = Quest::new(quiz_config(70.0));
        assert!(matches!(
            quest.open_assessment(),
            Err(QuestError::NotEnoughTrials {
                recorded: 0,
                required: 3
            })
        ));
        for i in 0..3 {
            run_to_end(&mut quest, LaunchParams::angled(20.0 + i as f64, 45.0), i as f64 * 10.0);
        }
        assert!(quest.open_assessment().is_ok());
        assert_eq!(quest.answer("q1", "a"), Ok(()));
    }

    #[test]
    fn test_three_of_four_stays_locked_at_80() {
        let completions = Arc::new(AtomicU32::new(0));
        let mut quest = Quest::new(quiz_config(80.0));
        let counter = Arc::clone(&completions);
        quest.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        for i in 0..3 {
            run_to_end(&mut quest, LaunchParams::angled(25.0, 45.0), i as f64 * 10.0);
        }
        quest.open_assessment().unwrap();
        for (id, a) in [("q1", "a"), ("q2", "a"), ("q3", "a"), ("q4", "b")] {
            quest.answer(id, a).unwrap();
        }
        let result = quest.submit_assessment().unwrap();
        assert_eq!(result.score, 75.0);
        assert!(!quest.is_complete());
        assert_eq!(completions.load(Ordering::SeqCst), 0);

        // Retake keeps trials; passing completes exactly once
        quest.retake().unwrap();
        assert_eq!(quest.history().len(), 3);
        for id in ["q1", "q2", "q3", "q4"] {
            quest.answer(id, "a").unwrap();
        }
        assert!(quest.submit_assessment().unwrap().passed);
        quest.retake().unwrap();
        for id in ["q1", "q2", "q3", "q4"] {
            quest.answer(id, "a").unwrap();
        }
        quest.submit_assessment().unwrap();
        assert!(quest.is_complete());
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_mid_flight_records_partial_trial() {
        let k = Kinematics::EARTH;
        let mut quest = archer_quest(40.0);
        let token = quest.launch(LaunchParams::angled(20.0, 45.0), 100.0).unwrap();
        quest.tick(token, 100.25);
        let trial = quest.stop(100.5).unwrap();
        let expected = k.position_at(20.0, 45.0, 0.5);
        assert!(!trial.success);
        assert_eq!(trial.phase, RunPhase::Stopped);
        assert!((trial.metrics.distance - expected.x).abs() < 1e-9);
        assert!((trial.metrics.height - expected.y).abs() < 1e-9);
        assert_eq!(quest.tick(token, 100.6), TickStatus::Stale);
    }

    #[test]
    fn test_rejections_are_logged_as_events() {
        let mut quest = archer_quest(50.0);
        quest.take_events();
        quest.launch(LaunchParams::angled(25.0, 45.0), 0.0).unwrap();
        assert!(quest.launch(LaunchParams::angled(30.0, 45.0), 0.1).is_err());
        assert!(quest.reset().is_err());
        assert!(quest.new_round().is_err());
        let codes: Vec<_> = quest.take_events().iter().map(|e| e.type_code()).collect();
        assert_eq!(codes, vec!["RS", "CR", "CR", "CR"]);
        assert_eq!(quest.history().len(), 0);
    }

    #[test]
    fn test_teardown_mid_run_records_nothing() {
        let mut quest = archer_quest(50.0);
        let token = quest.launch(LaunchParams::angled(25.0, 45.0), 0.0).unwrap();
        quest.tick(token, FRAME);
        quest.teardown();

        assert!(!quest.driver().has_scheduled());
        assert!(!quest.is_running());
        assert_eq!(quest.tick(token, 10.0), TickStatus::Stale);
        assert!(quest.history().is_empty());
    }

    #[test]
    fn test_new_round_draws_from_generator() {
        let config = QuestKind::RisingOrb.default_config().with_seed(11);
        let mut quest = Quest::new(config);
        for _ in 0..5 {
            let target = quest.new_round().unwrap();
            assert!(crate::constants::PLATFORM_HEIGHTS.contains(&target.value()));
        }
        assert_eq!(quest.round(), 6);
    }

    #[test]
    fn test_trial_derived_answer() {
        let mut config = QuestKind::Incline.default_config().with_seed(2);
        config.min_trials = 1;
        config.questions = vec![Question::from_trials(
            "accel",
            "Average acceleration?",
            TrialMetric::Acceleration,
            crate::assessment::TrialAggregate::Average,
        )];
        let mut quest = Quest::new(config);
        run_to_end(&mut quest, LaunchParams::angled(0.0, 30.0), 0.0);
        let measured = quest.history().average(TrialMetric::Acceleration).unwrap();
        // g·sin(30°) ≈ 4.905
        assert!((measured - 4.905).abs() < 0.05);
        quest.open_assessment().unwrap();
        quest.answer("accel", "5").unwrap();
        assert!(quest.submit_assessment().unwrap().passed);
    }
}
