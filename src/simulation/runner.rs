//! Headless simulation runner

use bevy::log::Level;
use bevy::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::assessment::AssessmentResult;
use crate::driver::LaunchParams;
use crate::events::{BusEvent, EventBus, QuestEvent, serialize_event};
use crate::plugin::{LiveRun, QuestInput, QuestSession};
use crate::quest::{Quest, QuestConfig, QuestDatabase, QuestError, QuestSummary, print_quest_summary};
use crate::trials::Trial;

use super::app_builder::HeadlessAppBuilder;
use super::config::{SimConfig, SimMode};
use super::sweep::{SweepPoint, init_parallel, parameter_grid, reachability_report, sweep};

/// A quest hosted in a headless app, advanced one fixed frame per update
pub struct HeadlessQuest {
    app: App,
    frame: f64,
    frames: u64,
}

impl HeadlessQuest {
    pub fn new(config: QuestConfig, fps: f64) -> Self {
        Self::from_builder(HeadlessAppBuilder::new(config).with_fps(fps))
    }

    pub fn from_builder(builder: HeadlessAppBuilder) -> Self {
        let frame = builder.frame_duration().as_secs_f64();
        let mut app = builder.build();

        app.world_mut()
            .resource_mut::<EventBus>()
            .emit(QuestEvent::SessionStart {
                session_id: uuid::Uuid::new_v4().to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            });
        // First update only initializes the clock (and flushes the load events)
        app.update();

        Self {
            app,
            frame,
            frames: 0,
        }
    }

    pub fn quest(&self) -> &Quest {
        &self.app.world().resource::<QuestSession>().quest
    }

    pub fn live(&self) -> &LiveRun {
        self.app.world().resource::<LiveRun>()
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// Seconds the clock advances per update
    pub fn frame_secs(&self) -> f64 {
        self.frame
    }

    /// Updates run since the clock started
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The session's event log, in order
    pub fn events(&self) -> &[BusEvent] {
        self.bus().log()
    }

    pub fn bus(&self) -> &EventBus {
        self.app.world().resource::<EventBus>()
    }

    /// Events in the compact `T:NNNNN|CODE|data` format
    pub fn event_lines(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| serialize_event(e.time_ms, &e.event))
            .collect()
    }

    /// Play one launch to completion, optionally pressing stop after
    /// `stop_after` seconds. Returns the recorded trial, or None when the
    /// launch was rejected.
    pub fn launch(&mut self, params: LaunchParams, stop_after: Option<f64>) -> Option<Trial> {
        let before = self.quest().history().len();
        self.app.world_mut().resource_mut::<QuestInput>().launch = Some(params);
        self.step();

        if self.quest().history().len() == before && !self.quest().is_running() {
            return None;
        }

        let safety_cap = self.quest().config().safety_cap;
        let max_frames = ((safety_cap + 1.0) / self.frame).ceil() as u64;
        let stop_frame = stop_after.map(|secs| ((secs / self.frame).round() as u64).max(1));

        for frame in 1..=max_frames {
            if self.quest().history().len() > before {
                break;
            }
            if stop_frame == Some(frame) {
                self.app.world_mut().resource_mut::<QuestInput>().stop = true;
            }
            self.step();
        }

        if self.quest().history().len() > before {
            self.quest().history().last().cloned()
        } else {
            warn!("Run did not finish within {:.1}s", safety_cap + 1.0);
            None
        }
    }

    /// Draw a new target
    pub fn new_round(&mut self) {
        self.app.world_mut().resource_mut::<QuestInput>().new_round = true;
        self.step();
    }

    /// Run a command against the quest, then flush its events through one frame
    pub fn with_quest<T>(&mut self, f: impl FnOnce(&mut Quest) -> T) -> T {
        let result = {
            let mut session = self.app.world_mut().resource_mut::<QuestSession>();
            f(&mut session.quest)
        };
        self.step();
        result
    }

    pub fn answer(&mut self, question_id: &str, answer: &str) -> Result<(), QuestError> {
        self.with_quest(|quest| {
            quest.open_assessment()?;
            quest.answer(question_id, answer)
        })
    }

    pub fn submit(&mut self) -> Result<AssessmentResult, QuestError> {
        self.with_quest(|quest| quest.submit_assessment())
    }

    /// Open the assessment, fill in `answers` and submit
    pub fn take_assessment(&mut self, answers: &[(String, String)]) -> Result<AssessmentResult, QuestError> {
        self.with_quest(|quest| answer_and_submit(quest, answers))
    }

    /// Clear the answers for another attempt
    pub fn retake(&mut self) -> Result<(), QuestError> {
        self.with_quest(|quest| quest.retake())
    }

    pub fn summary(&self) -> QuestSummary {
        self.quest().summary()
    }

    fn step(&mut self) {
        self.app.update();
        self.frames += 1;
    }
}

fn answer_and_submit(quest: &mut Quest, answers: &[(String, String)]) -> Result<AssessmentResult, QuestError> {
    quest.open_assessment()?;
    for (id, answer) in answers {
        quest.answer(id, answer.as_str())?;
    }
    quest.submit_assessment()
}

/// Result of playing a scripted quest session
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: QuestSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_error: Option<String>,
    pub events: Vec<String>,
}

/// Sweep results for one target value
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub target: f64,
    pub hits: usize,
    pub points: Vec<SweepPoint>,
}

/// Find the quest named by the simulation config
pub fn resolve_quest(config: &SimConfig) -> Result<QuestConfig, String> {
    let quest = match &config.quest_file {
        Some(path) => QuestConfig::load(Path::new(path))?,
        None => QuestDatabase::load_from_dir(&config.quests_dir)
            .find(&config.quest)
            .cloned()
            .ok_or_else(|| format!("Unknown quest '{}'", config.quest))?,
    };
    Ok(match config.seed {
        Some(seed) => quest.with_seed(seed),
        None => quest,
    })
}

/// Play the configured launches, then the assessment if answers were given
pub fn run_quest(quest: QuestConfig, config: &SimConfig) -> RunReport {
    let mut builder = HeadlessAppBuilder::new(quest).with_fps(config.fps);
    if !config.quiet {
        builder = builder.with_logging(Level::WARN);
    }
    let mut headless = HeadlessQuest::from_builder(builder);

    for (i, params) in config.launches.iter().enumerate() {
        match headless.launch(*params, None) {
            Some(trial) if !config.quiet => eprintln!(
                "Launch {}: {} -> {:.2} (target {:.2}, {})",
                i + 1,
                if trial.success { "hit" } else { "miss" },
                trial.achieved,
                trial.required,
                trial.hint
            ),
            Some(_) => {}
            None => eprintln!("Launch {} rejected", i + 1),
        }
    }

    let (assessment, assessment_error) = if config.answers.is_empty() {
        (None, None)
    } else {
        match headless.take_assessment(&config.answers) {
            Ok(result) => (Some(result), None),
            Err(e) => (None, Some(e.to_string())),
        }
    };

    RunReport {
        summary: headless.summary(),
        assessment,
        assessment_error,
        events: headless.event_lines(),
    }
}

/// Run simulation based on config
pub fn run_simulation(config: SimConfig) -> Result<(), String> {
    init_parallel(config.parallel)?;

    if config.mode == SimMode::List {
        let db = QuestDatabase::load_from_dir(&config.quests_dir);
        for quest in &db.quests {
            println!(
                "{:<24} {:<14} {}",
                quest.name,
                quest.kind.cli_name(),
                quest.kind.description()
            );
        }
        return Ok(());
    }

    let quest = resolve_quest(&config)?;
    quest.warn_if_invalid();

    match &config.mode {
        SimMode::Run => {
            if !config.quiet {
                eprintln!(
                    "Running quest {} with {} launch(es){}",
                    quest.name,
                    config.launches.len(),
                    quest.seed.map(|s| format!(" (seed: {})", s)).unwrap_or_default()
                );
            }
            let report = run_quest(quest, &config);
            if config.event_log {
                for line in &report.events {
                    eprintln!("{}", line);
                }
            }
            if config.output_file.is_some() && !config.quiet {
                print_quest_summary(&report.summary);
            }
            output_json(&report, &config)
        }

        SimMode::Sweep => {
            let grid = parameter_grid(&quest, &config.resolution);
            let targets = quest.target.all_targets(quest.kinematics());
            if !config.quiet {
                eprintln!(
                    "Sweeping {} launches against {} target value(s)",
                    grid.len(),
                    targets.len()
                );
            }
            let reports: Vec<SweepReport> = targets
                .into_iter()
                .map(|target| {
                    let points = sweep(&quest, target, &grid);
                    SweepReport {
                        target: target.value(),
                        hits: points.iter().filter(|p| p.success).count(),
                        points,
                    }
                })
                .collect();
            if !config.quiet {
                for r in &reports {
                    eprintln!("  target {:>8.2}: {} / {} hits", r.target, r.hits, r.points.len());
                }
            }
            output_json(&reports, &config)
        }

        SimMode::Reachability => {
            let report = reachability_report(&quest, &config.resolution);
            if !config.quiet {
                println!("Reachability: {} ({})", quest.name, quest.kind.display_name());
                for entry in &report {
                    let best = entry
                        .best
                        .map(|p| format!("v={:.2} angle={:.1} mass={:.1} h={:.1}", p.velocity, p.angle_degrees, p.mass, p.height))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {:>8.2}  {:>5} / {:<5}  {}  {}",
                        entry.target,
                        entry.hits,
                        entry.launches,
                        if entry.reachable() { "OK " } else { "UNREACHABLE" },
                        best
                    );
                }
            }
            if config.output_file.is_some() || config.quiet {
                output_json(&report, &config)
            } else {
                Ok(())
            }
        }

        SimMode::List => Ok(()),
    }
}

fn output_json<T: Serialize>(value: &T, config: &SimConfig) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize results: {}", e))?;
    match &config.output_file {
        Some(output_file) => {
            fs::write(output_file, json).map_err(|e| format!("Failed to write {}: {}", output_file, e))?;
            if !config.quiet {
                println!("Results written to {}", output_file);
            }
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RunPhase;
    use crate::kinematics::Kinematics;
    use crate::quest::{QuestKind, TargetSpec, TargetValue};

    fn orb_at(height: f64) -> QuestConfig {
        let mut config = QuestKind::RisingOrb.default_config().with_seed(1);
        config.target = TargetSpec::Height {
            height: TargetValue::Fixed(height),
            tolerance: 0.5,
        };
        config
    }

    #[test]
    fn test_rising_orb_reaches_platform() {
        let mut headless = HeadlessQuest::new(orb_at(30.0), 60.0);
        let v = Kinematics::EARTH.required_velocity_for_height(30.0);
        let trial = headless.launch(LaunchParams::vertical(v), None).unwrap();
        assert!(trial.success);
        assert_eq!(trial.phase, RunPhase::TargetReached);
        assert!((trial.achieved - 30.0).abs() <= 0.5);
    }

    #[test]
    fn test_stop_after_half_second() {
        let mut headless = HeadlessQuest::new(orb_at(30.0), 60.0);
        let trial = headless.launch(LaunchParams::vertical(20.0), Some(0.5)).unwrap();
        assert_eq!(trial.phase, RunPhase::Stopped);
        assert!(!trial.success);
        assert!((trial.metrics.time - 0.5).abs() < 1e-6);
        let expected = Kinematics::EARTH.vertical_position_at(20.0, 0.5);
        assert!((trial.metrics.height - expected).abs() < 1e-6);
    }

    #[test]
    fn test_event_log_is_ordered() {
        let mut headless = HeadlessQuest::new(orb_at(30.0), 60.0);
        headless.launch(LaunchParams::vertical(24.26), None);
        let codes: Vec<_> = headless.events().iter().map(|e| e.event.type_code()).collect();
        assert_eq!(codes, vec!["SE", "QL", "TD", "RS", "RE", "TR"]);
        let run: Vec<_> = headless.bus().run_events(1).iter().map(|e| e.code()).collect();
        assert_eq!(run, vec!["RS", "RE", "TR"]);
        assert!(headless.event_lines()[3].contains("|RS|1|"));
        let times: Vec<u32> = headless.events().iter().map(|e| e.time_ms).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_assessment_requires_trials() {
        let mut headless = HeadlessQuest::new(orb_at(30.0), 60.0);
        let err = headless.take_assessment(&[]).unwrap_err();
        assert!(matches!(err, QuestError::NotEnoughTrials { recorded: 0, .. }));
        assert_eq!(headless.events().last().map(|e| e.event.type_code()), Some("CR"));
    }

    #[test]
    fn test_resolve_unknown_quest() {
        let config = SimConfig {
            quest: "no-such-quest".to_string(),
            quests_dir: "does/not/exist".to_string(),
            ..Default::default()
        };
        assert!(resolve_quest(&config).is_err());

        let config = SimConfig {
            quest: "incline".to_string(),
            quests_dir: "does/not/exist".to_string(),
            seed: Some(5),
            ..Default::default()
        };
        let quest = resolve_quest(&config).unwrap();
        assert_eq!(quest.kind, QuestKind::Incline);
        assert_eq!(quest.seed, Some(5));
    }
}
