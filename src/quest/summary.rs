//! Quest session summary and JSON output

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::Quest;
use crate::trials::Trial;

/// Session summary for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestSummary {
    pub session_id: String,
    pub generated_at: String,
    pub quest: String,
    pub kind: String,
    pub rounds: u32,
    pub current_target: f64,
    pub trials_recorded: usize,
    pub successes: usize,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_error_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_trial: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_trial: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_score: Option<f64>,
    pub assessment_attempts: u32,
    pub pass_threshold: f64,
    pub completed: bool,
    pub trials: Vec<Trial>,
}

impl QuestSummary {
    /// Create summary from a quest
    pub fn from_quest(quest: &Quest) -> Self {
        let history = quest.history();
        let assessment = quest.assessment();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            quest: quest.config().name.clone(),
            kind: quest.config().kind.cli_name().to_string(),
            rounds: quest.round(),
            current_target: quest.target().value(),
            trials_recorded: history.len(),
            successes: history.success_count(),
            success_rate: history.success_rate(),
            average_error_percent: history.average_error(),
            best_trial: history.best().map(|t| t.trial_number),
            worst_trial: history.worst().map(|t| t.trial_number),
            average_accuracy: history.average_accuracy(),
            assessment_score: assessment.and_then(|a| a.score()),
            assessment_attempts: assessment.map(|a| a.attempts()).unwrap_or(0),
            pass_threshold: quest.config().pass_threshold,
            completed: quest.is_complete(),
            trials: history.trials().to_vec(),
        }
    }

    /// Write summary to JSON file
    pub fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Print quest summary to console
pub fn print_quest_summary(summary: &QuestSummary) {
    println!("\n========================================");
    println!("  {} ({})", summary.quest.to_uppercase(), summary.kind);
    println!("========================================");
    println!();
    println!(
        "  Trials: {} ({} hits, {:.0}%)",
        summary.trials_recorded,
        summary.successes,
        summary.success_rate * 100.0
    );
    if let Some(err) = summary.average_error_percent {
        println!("  Average error: {:.1}%", err);
    }
    if let Some(acc) = summary.average_accuracy {
        println!("  Average accuracy: {:.1}", acc);
    }
    println!();

    for trial in &summary.trials {
        let marker = if trial.success { "[HIT]" } else { "[MISS]" };
        println!(
            "  Trial {}: {} v={:.2} angle={:.1} -> {:.2} (target {:.2}, {:.1}% off, {})",
            trial.trial_number,
            marker,
            trial.params.velocity,
            trial.params.angle_degrees,
            trial.achieved,
            trial.required,
            trial.error_percent,
            trial.hint
        );
    }

    println!();
    match summary.assessment_score {
        Some(score) => println!(
            "  Assessment: {:.0}% (pass {:.0}%) after {} attempt(s)",
            score, summary.pass_threshold, summary.assessment_attempts
        ),
        None => println!("  Assessment: not submitted"),
    }
    println!(
        "  Quest {}",
        if summary.completed { "COMPLETE" } else { "LOCKED" }
    );
    println!("========================================");
    println!();
}
