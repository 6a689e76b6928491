//! Event type definitions for the quest audit log

use serde::{Deserialize, Serialize};

/// Everything a quest reports while it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuestEvent {
    // === Session Events ===
    /// Session started (once per quest screen)
    SessionStart {
        session_id: String, // UUID v4
        timestamp: String,  // ISO 8601
    },
    /// Quest configuration loaded
    QuestLoaded {
        quest: String,
        kind: String,
        seed: Option<u64>,
    },
    /// New target drawn from the generator
    TargetDrawn { round: u32, value: f64 },

    // === Run Events ===
    /// Run started
    RunStart {
        run: u64,
        velocity: f64,
        angle: f64,
        mass: f64,
    },
    /// Run ended (any terminal phase)
    RunEnd {
        run: u64,
        phase: String,
        t: f64,
        success: bool,
    },
    /// Trial appended to history
    TrialRecorded {
        trial_number: u32,
        error_percent: f64,
        success: bool,
    },

    // === Assessment Events ===
    /// Assessment offered to the learner
    AssessmentOpened { questions: usize },
    /// Assessment graded
    AssessmentSubmitted { score: f64, passed: bool },
    /// Answers cleared for another attempt
    AssessmentRetake { attempt: u32 },
    /// Completion gate satisfied
    QuestComplete { quest: String },

    // === Contract Violations ===
    /// A command was rejected and left state untouched
    CommandRejected { command: String, reason: String },
}

impl QuestEvent {
    /// Get the event type code for compact serialization
    pub fn type_code(&self) -> &'static str {
        match self {
            QuestEvent::SessionStart { .. } => "SE",
            QuestEvent::QuestLoaded { .. } => "QL",
            QuestEvent::TargetDrawn { .. } => "TD",
            QuestEvent::RunStart { .. } => "RS",
            QuestEvent::RunEnd { .. } => "RE",
            QuestEvent::TrialRecorded { .. } => "TR",
            QuestEvent::AssessmentOpened { .. } => "AO",
            QuestEvent::AssessmentSubmitted { .. } => "AS",
            QuestEvent::AssessmentRetake { .. } => "AR",
            QuestEvent::QuestComplete { .. } => "QC",
            QuestEvent::CommandRejected { .. } => "CR",
        }
    }

    pub fn rejected(command: &str, reason: impl std::fmt::Display) -> Self {
        QuestEvent::CommandRejected {
            command: command.to_string(),
            reason: reason.to_string(),
        }
    }
}
