//! Scenario execution engine

use bevy::prelude::*;

use crate::quest::{QUESTS_DIR, QuestConfig, QuestDatabase};
use crate::simulation::HeadlessQuest;

use super::assertions::{AssertionError, CapturedEvent, WorldState, check_sequence, check_state};
use super::parser::{Step, TestDefinition, TestSetup};

/// Result of running a scenario
#[derive(Debug)]
pub enum TestResult {
    Pass { frames: u64 },
    Fail { error: AssertionError },
    Error { message: String },
}

/// Quest config for a scenario: the named quest with the setup overrides applied
pub fn build_quest(setup: &TestSetup, db: &QuestDatabase) -> Result<QuestConfig, String> {
    let mut config = db.find(&setup.quest).cloned().ok_or_else(|| {
        format!("Quest '{}' not found. Available: {:?}", setup.quest, db.names())
    })?;

    if let Some(seed) = setup.seed {
        config = config.with_seed(seed);
    }
    if let Some(target) = &setup.target {
        config.target = target.clone();
    }
    if let Some(min_trials) = setup.min_trials {
        config.min_trials = min_trials;
    }
    if let Some(threshold) = setup.pass_threshold {
        config.pass_threshold = threshold;
    }
    if let Some(questions) = &setup.questions {
        config.questions = questions.clone();
    }
    Ok(config)
}

/// Run a single scenario and return the result
pub fn run_test(test: &TestDefinition) -> TestResult {
    let db = QuestDatabase::load_from_dir(QUESTS_DIR);
    run_test_with(test, &db)
}

/// Run a scenario against an already-loaded quest database
pub fn run_test_with(test: &TestDefinition, db: &QuestDatabase) -> TestResult {
    let config = match build_quest(&test.setup, db) {
        Ok(config) => config,
        Err(message) => return TestResult::Error { message },
    };

    let mut headless = HeadlessQuest::new(config, test.setup.fps);

    for (i, step) in test.steps.iter().enumerate() {
        run_step(&mut headless, step);

        let step_number = i + 1;
        for assertion in test.expect.state.iter().filter(|s| s.after_step == Some(step_number)) {
            if let Err(error) = check_quest_state(&headless, &assertion.checks) {
                return TestResult::Fail {
                    error: with_context(error, &format!("after step {}", step_number)),
                };
            }
        }
    }

    let captured: Vec<CapturedEvent> = headless.events().iter().map(CapturedEvent::from_bus_event).collect();
    if let Err(error) = check_sequence(&test.expect.sequence, &captured) {
        return TestResult::Fail { error };
    }

    for assertion in &test.expect.trial {
        let Some(trial) = headless.quest().history().get(assertion.number) else {
            return TestResult::Fail {
                error: AssertionError {
                    message: format!("Trial {} not recorded", assertion.number),
                    expected: format!("trial {}", assertion.number),
                    actual: format!("{} trial(s)", headless.quest().history().len()),
                },
            };
        };
        if let Err(error) = check_state(&assertion.checks, &WorldState::from_trial(trial)) {
            return TestResult::Fail {
                error: with_context(error, &format!("trial {}", assertion.number)),
            };
        }
    }

    for assertion in test.expect.state.iter().filter(|s| s.after_step.is_none()) {
        if let Err(error) = check_quest_state(&headless, &assertion.checks) {
            return TestResult::Fail { error };
        }
    }

    TestResult::Pass {
        frames: headless.frames(),
    }
}

/// Apply one scripted action; rejected commands surface as CR events
fn run_step(headless: &mut HeadlessQuest, step: &Step) {
    match step {
        Step::Launch { stop_at, .. } => {
            if let Some(params) = step.launch_params() {
                if headless.launch(params, *stop_at).is_none() {
                    debug!("Launch {:?} produced no trial", params);
                }
            }
        }
        Step::Answer { question, answer } => {
            if let Err(e) = headless.answer(question, answer) {
                debug!("Answer to {} rejected: {}", question, e);
            }
        }
        Step::Submit => {
            if let Err(e) = headless.submit() {
                debug!("Submit rejected: {}", e);
            }
        }
        Step::Retake => {
            if let Err(e) = headless.retake() {
                debug!("Retake rejected: {}", e);
            }
        }
        Step::NewRound => headless.new_round(),
    }
}

fn check_quest_state(headless: &HeadlessQuest, checks: &[String]) -> Result<(), AssertionError> {
    let rejected = headless.bus().rejection_count();
    check_state(checks, &WorldState::from_quest(headless.quest(), rejected))
}

fn with_context(mut error: AssertionError, context: &str) -> AssertionError {
    error.message = format!("{} ({})", error.message, context);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::parser::{StateAssertion, TestExpectations, TrialAssertion};

    fn definition(setup: &str, steps: Vec<Step>, expect: TestExpectations) -> TestDefinition {
        TestDefinition {
            name: "inline".to_string(),
            description: None,
            setup: toml::from_str(setup).unwrap(),
            steps,
            expect,
        }
    }

    fn launch(velocity: f64, angle: f64) -> Step {
        Step::Launch {
            velocity,
            angle,
            mass: 1.0,
            height: 0.0,
            stop_at: None,
        }
    }

    fn checks(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_inline_scenario_passes() {
        let setup = r#"
quest = "archer"
seed = 2
target = { type = "distance", distance = 63.71, tolerance = 2.5 }
"#;
        let expect = TestExpectations {
            sequence: Vec::new(),
            trial: vec![TrialAssertion {
                number: 1,
                checks: checks(&["success = true", "phase = landed"]),
            }],
            state: vec![StateAssertion {
                after_step: None,
                checks: checks(&["trials = 1", "successes = 1", "rejected = 0"]),
            }],
        };
        let test = definition(setup, vec![launch(25.0, 45.0)], expect);
        let result = run_test_with(&test, &QuestDatabase::default_quests());
        assert!(matches!(result, TestResult::Pass { .. }), "{:?}", result);
    }

    #[test]
    fn test_failing_check_reports_context() {
        let setup = r#"quest = "archer""#;
        let expect = TestExpectations {
            state: vec![StateAssertion {
                after_step: Some(1),
                checks: checks(&["trials = 2"]),
            }],
            ..Default::default()
        };
        let test = definition(setup, vec![launch(25.0, 45.0)], expect);
        match run_test_with(&test, &QuestDatabase::default_quests()) {
            TestResult::Fail { error } => assert!(error.message.contains("after step 1")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_quest_is_error() {
        let test = definition(r#"quest = "juggling""#, Vec::new(), TestExpectations::default());
        assert!(matches!(
            run_test_with(&test, &QuestDatabase::default_quests()),
            TestResult::Error { .. }
        ));
    }
}
