//! Assertion checking for scenario expectations

use std::collections::BTreeMap;

use super::parser::ExpectedEvent;
use crate::events::BusEvent;
use crate::events::serialize_event;
use crate::quest::Quest;
use crate::trials::Trial;

/// Error when an assertion fails
#[derive(Debug)]
pub struct AssertionError {
    pub message: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for AssertionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n    Expected: {}\n    Actual: {}", self.message, self.expected, self.actual)
    }
}

/// Captured event with timing info
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub time_ms: u32,
    pub code: String,
    /// Compact `T:NNNNN|CODE|data` line
    pub line: String,
}

impl CapturedEvent {
    pub fn from_bus_event(event: &BusEvent) -> Self {
        Self {
            time_ms: event.time_ms,
            code: event.event.type_code().to_string(),
            line: serialize_event(event.time_ms, &event.event),
        }
    }
}

/// Check if captured events match expected sequence
pub fn check_sequence(expected: &[ExpectedEvent], captured: &[CapturedEvent]) -> Result<(), AssertionError> {
    let mut captured_idx = 0;

    for (i, exp) in expected.iter().enumerate() {
        // Find matching event starting from current position
        let found = captured[captured_idx..].iter().enumerate().find(|(_, cap)| {
            if !cap.code.eq_ignore_ascii_case(&exp.event) {
                return false;
            }
            if let Some(ref needle) = exp.contains {
                if !cap.line.contains(needle.as_str()) {
                    return false;
                }
            }
            true
        });

        match found {
            Some((offset, cap)) => {
                if let Some(min) = exp.time_min_ms {
                    if cap.time_ms < min {
                        return Err(AssertionError {
                            message: format!("Event #{} '{}' occurred too early", i + 1, exp.event),
                            expected: format!("time >= {}ms", min),
                            actual: cap.line.clone(),
                        });
                    }
                }
                if let Some(max) = exp.time_max_ms {
                    if cap.time_ms > max {
                        return Err(AssertionError {
                            message: format!("Event #{} '{}' occurred too late", i + 1, exp.event),
                            expected: format!("time <= {}ms", max),
                            actual: cap.line.clone(),
                        });
                    }
                }
                captured_idx += offset + 1;
            }
            None => {
                let contains_str = exp
                    .contains
                    .as_ref()
                    .map(|c| format!(" containing '{}'", c))
                    .unwrap_or_default();
                return Err(AssertionError {
                    message: format!("Event #{} '{}'{} not found", i + 1, exp.event, contains_str),
                    expected: format!("'{}' event in sequence", exp.event),
                    actual: format!(
                        "events after position {}: {:?}",
                        captured_idx,
                        captured[captured_idx..].iter().map(|e| &e.code).collect::<Vec<_>>()
                    ),
                });
            }
        }
    }

    Ok(())
}

/// One observable value
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateValue::Number(v) => write!(f, "{:.3}", v),
            StateValue::Bool(v) => write!(f, "{}", v),
            StateValue::Text(v) => write!(f, "{}", v),
            StateValue::Missing => write!(f, "(none)"),
        }
    }
}

fn number(value: Option<f64>) -> StateValue {
    value.map(StateValue::Number).unwrap_or(StateValue::Missing)
}

/// Named values a check can refer to
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub values: BTreeMap<String, StateValue>,
}

impl WorldState {
    /// Snapshot of quest-level values
    pub fn from_quest(quest: &Quest, rejected: usize) -> Self {
        let history = quest.history();
        let assessment = quest.assessment();
        let mut values = BTreeMap::new();
        values.insert("trials".into(), StateValue::Number(history.len() as f64));
        values.insert("successes".into(), StateValue::Number(history.success_count() as f64));
        values.insert("success_rate".into(), StateValue::Number(history.success_rate()));
        values.insert("average_error".into(), number(history.average_error()));
        values.insert("average_accuracy".into(), number(history.average_accuracy()));
        values.insert("best_trial".into(), number(history.best().map(|t| t.trial_number as f64)));
        values.insert("round".into(), StateValue::Number(quest.round() as f64));
        values.insert("target".into(), StateValue::Number(quest.target().value()));
        values.insert("phase".into(), StateValue::Text(quest.phase().to_string()));
        values.insert("running".into(), StateValue::Bool(quest.is_running()));
        values.insert("complete".into(), StateValue::Bool(quest.is_complete()));
        values.insert("assessment_available".into(), StateValue::Bool(quest.assessment_available()));
        values.insert("rejected".into(), StateValue::Number(rejected as f64));
        values.insert("assessment.open".into(), StateValue::Bool(assessment.is_some()));
        values.insert("assessment.score".into(), number(assessment.and_then(|a| a.score())));
        values.insert(
            "assessment.passed".into(),
            StateValue::Bool(assessment.is_some_and(|a| a.passed())),
        );
        values.insert(
            "assessment.attempts".into(),
            StateValue::Number(assessment.map(|a| a.attempts()).unwrap_or(0) as f64),
        );
        values.insert(
            "assessment.unanswered".into(),
            StateValue::Number(assessment.map(|a| a.unanswered().len()).unwrap_or(0) as f64),
        );
        Self { values }
    }

    /// Snapshot of one trial's values
    pub fn from_trial(trial: &Trial) -> Self {
        let mut values = BTreeMap::new();
        values.insert("phase".into(), StateValue::Text(trial.phase.to_string()));
        values.insert("success".into(), StateValue::Bool(trial.success));
        values.insert("landed_on_target".into(), StateValue::Bool(trial.landed_on_target));
        values.insert("achieved".into(), StateValue::Number(trial.achieved));
        values.insert("required".into(), StateValue::Number(trial.required));
        values.insert("error_percent".into(), StateValue::Number(trial.error_percent));
        values.insert("distance".into(), StateValue::Number(trial.metrics.distance));
        values.insert("height".into(), StateValue::Number(trial.metrics.height));
        values.insert("time".into(), StateValue::Number(trial.metrics.time));
        values.insert("speed".into(), StateValue::Number(trial.metrics.speed));
        values.insert("acceleration".into(), StateValue::Number(trial.metrics.acceleration));
        values.insert("hint".into(), StateValue::Text(trial.hint.message().to_string()));
        values.insert("accuracy".into(), number(trial.accuracy));
        values.insert("velocity".into(), StateValue::Number(trial.params.velocity));
        values.insert("angle".into(), StateValue::Number(trial.params.angle_degrees));
        Self { values }
    }
}

/// Parse a check string into (path, operator, value)
fn parse_check(check: &str) -> Option<(&str, &str, &str)> {
    // Try operators in order of specificity (>= before >, etc.)
    for op in &["~=", ">=", "<=", "!=", "=", ">", "<"] {
        if let Some(idx) = check.find(op) {
            let path = check[..idx].trim();
            let value = check[idx + op.len()..].trim();
            return Some((path, op, value));
        }
    }
    None
}

/// Check every assertion string against a snapshot
pub fn check_state(checks: &[String], state: &WorldState) -> Result<(), AssertionError> {
    for check in checks {
        let (path, operator, expected_value) = parse_check(check).ok_or_else(|| AssertionError {
            message: format!("Invalid check syntax: {}", check),
            expected: "format: 'name = value', 'name >= value' or 'name ~= value'".to_string(),
            actual: check.clone(),
        })?;

        let actual = state.values.get(path).ok_or_else(|| AssertionError {
            message: format!("Unknown value '{}'", path),
            expected: "one of the snapshot values".to_string(),
            actual: format!("available: {:?}", state.values.keys().collect::<Vec<_>>()),
        })?;

        match actual {
            StateValue::Number(v) => check_float_comparison(check, *v, operator, expected_value)?,
            StateValue::Bool(v) => {
                check_equality(check, operator, &v.to_string(), expected_value.trim_matches('"'))?
            }
            StateValue::Text(v) => {
                let expected = expected_value.trim_matches('"');
                check_equality(check, operator, &v.to_lowercase(), &expected.to_lowercase())?
            }
            StateValue::Missing => {
                if expected_value != "none" || !matches!(operator, "=") {
                    return Err(AssertionError {
                        message: format!("Check failed: {}", check),
                        expected: expected_value.to_string(),
                        actual: actual.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn check_equality(check: &str, operator: &str, actual: &str, expected: &str) -> Result<(), AssertionError> {
    let pass = match operator {
        "=" | "~=" => actual == expected,
        "!=" => actual != expected,
        _ => false,
    };
    if !pass {
        return Err(AssertionError {
            message: format!("Check failed: {}", check),
            expected: format!("{} {}", operator, expected),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Check float comparison with operator
///
/// `=` allows 0.01 of slack; `~=` allows 1%.
fn check_float_comparison(check: &str, actual: f64, operator: &str, expected_str: &str) -> Result<(), AssertionError> {
    let value: f64 = expected_str.trim().parse().map_err(|_| AssertionError {
        message: format!("Invalid value in {}", check),
        expected: "number".to_string(),
        actual: expected_str.to_string(),
    })?;

    let pass = match operator {
        ">=" => actual >= value,
        "<=" => actual <= value,
        ">" => actual > value,
        "<" => actual < value,
        "=" => (actual - value).abs() < 0.01,
        "~=" => (actual - value).abs() <= value.abs() * 0.01 + 1e-9,
        "!=" => (actual - value).abs() >= 0.01,
        _ => false,
    };

    if !pass {
        return Err(AssertionError {
            message: format!("Check failed: {} (actual: {:.3})", check, actual),
            expected: format!("{} {}", operator, value),
            actual: format!("{:.3}", actual),
        });
    }

    Ok(())
}
