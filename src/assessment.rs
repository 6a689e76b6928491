//! Assessment/quiz evaluator
//!
//! A fixed, ordered question bank scored against literal answers or against
//! the learner's own trial history. Submitting locks answers and score until
//! `retake`, which never touches trial history.

use std::collections::BTreeMap;

use bevy::log::info;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PASS_THRESHOLD, TRIAL_ANSWER_TOLERANCE};
use crate::trials::{TrialHistory, TrialMetric};

/// Contract violations rejected by the assessment (state is left untouched)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentError {
    AlreadySubmitted,
    /// Question ids still missing an answer
    Unanswered(Vec<String>),
    UnknownQuestion(String),
    NotSubmitted,
}

impl std::fmt::Display for AssessmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssessmentError::AlreadySubmitted => write!(f, "assessment already submitted"),
            AssessmentError::Unanswered(ids) => {
                write!(f, "unanswered questions: {}", ids.join(", "))
            }
            AssessmentError::UnknownQuestion(id) => write!(f, "unknown question '{}'", id),
            AssessmentError::NotSubmitted => write!(f, "assessment not submitted yet"),
        }
    }
}

impl std::error::Error for AssessmentError {}

/// How a trial-derived expected answer reduces the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialAggregate {
    #[default]
    Average,
    /// Value of the lowest-error trial
    Best,
    Latest,
}

/// Expected answer rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExpectedAnswer {
    /// Multiple choice, matched case-insensitively
    Choice {
        correct: String,
        #[serde(default)]
        options: Vec<String>,
    },
    /// Literal number within tolerance
    Numeric {
        value: f64,
        #[serde(default)]
        tolerance: f64,
    },
    /// Number derived from the learner's trials
    FromTrials {
        metric: TrialMetric,
        #[serde(default)]
        aggregate: TrialAggregate,
        #[serde(default = "default_trial_tolerance")]
        tolerance: f64,
    },
}

fn default_trial_tolerance() -> f64 {
    TRIAL_ANSWER_TOLERANCE
}

impl ExpectedAnswer {
    /// Numeric value this rule expects, if it is numeric and defined
    pub fn expected_value(&self, history: &TrialHistory) -> Option<f64> {
        match self {
            ExpectedAnswer::Choice { .. } => None,
            ExpectedAnswer::Numeric { value, .. } => Some(*value),
            ExpectedAnswer::FromTrials {
                metric, aggregate, ..
            } => match aggregate {
                TrialAggregate::Average => history.average(*metric),
                TrialAggregate::Best => history.best().map(|t| t.metric(*metric)),
                TrialAggregate::Latest => history.last().map(|t| t.metric(*metric)),
            },
        }
    }

    /// Whether `answer` satisfies the rule. Unparseable input is simply wrong.
    pub fn accepts(&self, answer: &str, history: &TrialHistory) -> bool {
        match self {
            ExpectedAnswer::Choice { correct, .. } => {
                answer.trim().eq_ignore_ascii_case(correct.trim())
            }
            ExpectedAnswer::Numeric { tolerance, .. } | ExpectedAnswer::FromTrials { tolerance, .. } => {
                let (Some(given), Some(expected)) = (parse_number(answer), self.expected_value(history))
                else {
                    return false;
                };
                (given - expected).abs() <= tolerance.abs() + 1e-9
            }
        }
    }
}

/// Leading number of a free-form entry ("9.8", " 9.8 m/s²"); None if absent or non-finite
pub fn parse_number(input: &str) -> Option<f64> {
    let token = input.split_whitespace().next()?;
    let numeric: String = token
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .collect();
    numeric.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One quiz question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub expected: ExpectedAnswer,
    /// Explicit point value; questions without one weigh 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
}

impl Question {
    pub fn choice(id: &str, prompt: &str, correct: &str, options: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            expected: ExpectedAnswer::Choice {
                correct: correct.to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            points: None,
        }
    }

    pub fn numeric(id: &str, prompt: &str, value: f64, tolerance: f64) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            expected: ExpectedAnswer::Numeric { value, tolerance },
            points: None,
        }
    }

    pub fn from_trials(id: &str, prompt: &str, metric: TrialMetric, aggregate: TrialAggregate) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            expected: ExpectedAnswer::FromTrials {
                metric,
                aggregate,
                tolerance: TRIAL_ANSWER_TOLERANCE,
            },
            points: None,
        }
    }

    pub fn with_points(mut self, points: f64) -> Self {
        self.points = Some(points);
        self
    }

    fn weight(&self) -> f64 {
        self.points.filter(|p| p.is_finite() && *p >= 0.0).unwrap_or(1.0)
    }
}

/// Per-question grading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub id: String,
    pub answer: String,
    pub correct: bool,
    pub points_awarded: f64,
    pub points_possible: f64,
    /// Resolved numeric expectation, for feedback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
}

/// Frozen result of one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// 0..100
    pub score: f64,
    pub passed: bool,
    pub correct_count: usize,
    pub total_questions: usize,
    pub questions: Vec<QuestionResult>,
}

/// Answers, submission flag and score for one assessment attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    questions: Vec<Question>,
    pass_threshold: f64,
    answers: BTreeMap<String, String>,
    submitted: bool,
    result: Option<AssessmentResult>,
    attempts: u32,
}

impl Assessment {
    pub fn new(questions: Vec<Question>, pass_threshold: f64) -> Self {
        let pass_threshold = if pass_threshold.is_finite() {
            pass_threshold.clamp(0.0, 100.0)
        } else {
            DEFAULT_PASS_THRESHOLD
        };
        Self {
            questions,
            pass_threshold,
            answers: BTreeMap::new(),
            submitted: false,
            result: None,
            attempts: 0,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Completed submissions, including ones later retaken
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Score, only defined once submitted
    pub fn score(&self) -> Option<f64> {
        self.result.as_ref().map(|r| r.score)
    }

    pub fn passed(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.passed)
    }

    pub fn result(&self) -> Result<&AssessmentResult, AssessmentError> {
        self.result.as_ref().ok_or(AssessmentError::NotSubmitted)
    }

    /// Ids of questions without an answer, in bank order
    pub fn unanswered(&self) -> Vec<String> {
        self.questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .map(|q| q.id.clone())
            .collect()
    }

    /// Set (or replace) the answer to one question
    pub fn answer(&mut self, question_id: &str, answer: impl Into<String>) -> Result<(), AssessmentError> {
        if self.submitted {
            return Err(AssessmentError::AlreadySubmitted);
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(AssessmentError::UnknownQuestion(question_id.to_string()));
        }
        self.answers.insert(question_id.to_string(), answer.into());
        Ok(())
    }

    /// Grade every answer and lock the attempt. A second submit is rejected.
    pub fn submit(&mut self, history: &TrialHistory) -> Result<&AssessmentResult, AssessmentError> {
        if self.submitted {
            return Err(AssessmentError::AlreadySubmitted);
        }
        let missing = self.unanswered();
        if !missing.is_empty() {
            return Err(AssessmentError::Unanswered(missing));
        }

        let questions: Vec<QuestionResult> = self
            .questions
            .iter()
            .map(|q| {
                let answer = self.answers.get(&q.id).cloned().unwrap_or_default();
                let correct = q.expected.accepts(&answer, history);
                let possible = q.weight();
                QuestionResult {
                    id: q.id.clone(),
                    answer,
                    correct,
                    points_awarded: if correct { possible } else { 0.0 },
                    points_possible: possible,
                    expected_value: q.expected.expected_value(history),
                }
            })
            .collect();

        let possible: f64 = questions.iter().map(|r| r.points_possible).sum();
        let awarded: f64 = questions.iter().map(|r| r.points_awarded).sum();
        // An empty bank has nothing to fail
        let score = if possible > 0.0 {
            (100.0 * awarded / possible).clamp(0.0, 100.0)
        } else {
            100.0
        };
        let correct_count = questions.iter().filter(|r| r.correct).count();
        let result = AssessmentResult {
            score,
            passed: score + 1e-9 >= self.pass_threshold,
            correct_count,
            total_questions: questions.len(),
            questions,
        };

        info!(
            "Assessment submitted: {}/{} correct, score {:.1} (pass {:.0}) -> {}",
            result.correct_count,
            result.total_questions,
            result.score,
            self.pass_threshold,
            if result.passed { "PASS" } else { "FAIL" }
        );

        self.submitted = true;
        self.attempts += 1;
        let stored = self.result.insert(result);
        Ok(&*stored)
    }

    /// Clear answers and score for another attempt
    pub fn retake(&mut self) {
        self.answers.clear();
        self.submitted = false;
        self.result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_question_bank() -> Vec<Question> {
        vec![
            Question::choice("q1", "What shape is a projectile's path?", "parabola", &["line", "parabola", "circle"]),
            Question::choice("q2", "Which angle maximizes range?", "45", &["30", "45", "60"]),
            Question::numeric("q3", "g on Earth (m/s²)?", 9.81, 0.05),
            Question::choice("q4", "Does mass change time of flight?", "no", &["yes", "no"]),
        ]
    }

    #[test]
    fn test_three_of_four_scores_75() {
        let mut assessment = Assessment::new(four_question_bank(), 80.0);
        assessment.answer("q1", "Parabola").unwrap();
        assessment.answer("q2", "45").unwrap();
        assessment.answer("q3", "9.8").unwrap();
        assessment.answer("q4", "yes").unwrap();

        let result = assessment.submit(&TrialHistory::new()).unwrap();
        assert_eq!(result.correct_count, 3);
        assert_eq!(result.score, 75.0);
        assert!(!result.passed);
        assert!(!assessment.passed());
    }

    #[test]
    fn test_score_undefined_before_submit() {
        let mut assessment = Assessment::new(four_question_bank(), 70.0);
        assert_eq!(assessment.score(), None);
        assert_eq!(assessment.result().unwrap_err(), AssessmentError::NotSubmitted);

        assessment.answer("q1", "parabola").unwrap();
        let err = assessment.submit(&TrialHistory::new()).unwrap_err();
        assert_eq!(
            err,
            AssessmentError::Unanswered(vec!["q2".into(), "q3".into(), "q4".into()])
        );
        assert!(!assessment.is_submitted());
    }

    #[test]
    fn test_second_submit_rejected() {
        let mut assessment = Assessment::new(four_question_bank(), 70.0);
        for (id, a) in [("q1", "parabola"), ("q2", "45"), ("q3", "9.81"), ("q4", "no")] {
            assessment.answer(id, a).unwrap();
        }
        let history = TrialHistory::new();
        assert_eq!(assessment.submit(&history).unwrap().score, 100.0);
        assert_eq!(
            assessment.submit(&history).unwrap_err(),
            AssessmentError::AlreadySubmitted
        );
        assert_eq!(assessment.answer("q1", "line"), Err(AssessmentError::AlreadySubmitted));
        assert_eq!(assessment.score(), Some(100.0));
    }

    #[test]
    fn test_retake_clears_attempt() {
        let mut assessment = Assessment::new(four_question_bank(), 70.0);
        for (id, a) in [("q1", "line"), ("q2", "30"), ("q3", "1"), ("q4", "yes")] {
            assessment.answer(id, a).unwrap();
        }
        assessment.submit(&TrialHistory::new()).unwrap();
        assert_eq!(assessment.score(), Some(0.0));

        assessment.retake();
        assert!(!assessment.is_submitted());
        assert!(assessment.answers().is_empty());
        assert_eq!(assessment.score(), None);
        assert_eq!(assessment.attempts(), 1);
    }

    #[test]
    fn test_explicit_points() {
        let bank = vec![
            Question::choice("a", "a", "x", &[]).with_points(30.0),
            Question::choice("b", "b", "x", &[]).with_points(25.0),
            Question::choice("c", "c", "x", &[]).with_points(25.0),
            Question::choice("d", "d", "x", &[]).with_points(20.0),
        ];
        let mut assessment = Assessment::new(bank, 85.0);
        for id in ["a", "b", "c"] {
            assessment.answer(id, "x").unwrap();
        }
        assessment.answer("d", "y").unwrap();
        let result = assessment.submit(&TrialHistory::new()).unwrap();
        assert!((result.score - 80.0).abs() < 1e-9);
        assert!(!result.passed);
    }

    #[test]
    fn test_unparseable_answer_is_wrong() {
        let bank = vec![Question::numeric("g", "g?", 9.81, 0.1)];
        let mut assessment = Assessment::new(bank, 60.0);
        assessment.answer("g", "nine point eight").unwrap();
        let result = assessment.submit(&TrialHistory::new()).unwrap();
        assert!(!result.questions[0].correct);
    }

    #[test]
    fn test_unknown_question() {
        let mut assessment = Assessment::new(four_question_bank(), 70.0);
        assert_eq!(
            assessment.answer("q9", "x"),
            Err(AssessmentError::UnknownQuestion("q9".into()))
        );
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 9.8 m/s²"), Some(9.8));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number("12m"), Some(12.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_question_bank_from_toml() {
        #[derive(Deserialize)]
        struct Bank {
            questions: Vec<Question>,
        }
        let bank: Bank = toml::from_str(
            r#"
[[questions]]
id = "avg-accel"
prompt = "What was your average acceleration?"
expected = { kind = "from-trials", metric = "acceleration" }
points = 30.0
"#,
        )
        .unwrap();
        let q = &bank.questions[0];
        assert_eq!(q.points, Some(30.0));
        assert_eq!(
            q.expected,
            ExpectedAnswer::FromTrials {
                metric: TrialMetric::Acceleration,
                aggregate: TrialAggregate::Average,
                tolerance: TRIAL_ANSWER_TOLERANCE,
            }
        );
    }
}
