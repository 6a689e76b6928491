//! Compact text format for quest event logs
//!
//! Format: `T:NNNNN|CODE|data...`
//! - T:NNNNN = timestamp in milliseconds (5 digits, wraps at 99999)
//! - CODE = 2-char event type code
//! - data = pipe-separated values specific to event type
//!
//! Examples:
//! ```text
//! T:00000|QL|Archer|archer|42
//! T:00016|RS|1|25.00|45.0|1.00
//! T:03620|RE|1|landed|3.604|1
//! T:03620|TR|1|0.00|1
//! ```

use super::types::QuestEvent;

fn fmt_bool(v: bool) -> &'static str {
    if v { "1" } else { "0" }
}

/// Serialize a QuestEvent to compact text format
pub fn serialize_event(time_ms: u32, event: &QuestEvent) -> String {
    let ts = format!("T:{:05}", time_ms % 100000);
    let code = event.type_code();

    let data = match event {
        QuestEvent::SessionStart {
            session_id,
            timestamp,
        } => format!("{}|{}", session_id, timestamp),
        QuestEvent::QuestLoaded { quest, kind, seed } => format!(
            "{}|{}|{}",
            quest,
            kind,
            seed.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
        ),
        QuestEvent::TargetDrawn { round, value } => format!("{}|{:.2}", round, value),
        QuestEvent::RunStart {
            run,
            velocity,
            angle,
            mass,
        } => format!("{}|{:.2}|{:.1}|{:.2}", run, velocity, angle, mass),
        QuestEvent::RunEnd {
            run,
            phase,
            t,
            success,
        } => format!("{}|{}|{:.3}|{}", run, phase, t, fmt_bool(*success)),
        QuestEvent::TrialRecorded {
            trial_number,
            error_percent,
            success,
        } => format!("{}|{:.2}|{}", trial_number, error_percent, fmt_bool(*success)),
        QuestEvent::AssessmentOpened { questions } => questions.to_string(),
        QuestEvent::AssessmentSubmitted { score, passed } => {
            format!("{:.1}|{}", score, fmt_bool(*passed))
        }
        QuestEvent::AssessmentRetake { attempt } => attempt.to_string(),
        QuestEvent::QuestComplete { quest } => quest.clone(),
        QuestEvent::CommandRejected { command, reason } => format!("{}|{}", command, reason),
    };

    format!("{}|{}|{}", ts, code, data)
}
