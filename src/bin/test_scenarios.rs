//! Quest scenario runner
//!
//! Usage:
//!   cargo run --bin test-scenarios                        # every scenario
//!   cargo run --bin test-scenarios -- assessment/         # one folder
//!   cargo run --bin test-scenarios -- --quests-dir my/quests runs/archer_range
//!   cargo run --bin test-scenarios -- --list              # show what would run
//!   cargo run --bin test-scenarios -- -v                  # descriptions and full errors

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kinequest::quest::{QUESTS_DIR, QuestDatabase};
use kinequest::testing::{
    SCENARIOS_DIR, TestDefinition, TestResult, discover_scenarios, parser::parse_test_file,
    run_test_with,
};

#[derive(Default)]
struct Options {
    verbose: bool,
    list: bool,
    filter: Option<String>,
    quests_dir: Option<String>,
}

fn parse_options() -> Options {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--verbose" | "-v" => options.verbose = true,
            "--list" => options.list = true,
            "--quests-dir" => options.quests_dir = args.next(),
            other if !other.starts_with('-') => options.filter = Some(other.to_string()),
            other => eprintln!("Warning: ignoring unknown flag {}", other),
        }
    }
    options
}

/// Outcome counts across the whole run
#[derive(Default)]
struct Tally {
    passed: usize,
    failed: usize,
    errors: usize,
    frames: u64,
}

impl Tally {
    fn record(&mut self, result: &TestResult) {
        match result {
            TestResult::Pass { frames } => {
                self.passed += 1;
                self.frames += frames;
            }
            TestResult::Fail { .. } => self.failed += 1,
            TestResult::Error { .. } => self.errors += 1,
        }
    }

    fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

fn main() {
    let options = parse_options();
    let base = Path::new(SCENARIOS_DIR);
    let paths = discover_scenarios(base, options.filter.as_deref());
    if paths.is_empty() {
        println!(
            "No scenarios under {}{}",
            SCENARIOS_DIR,
            options
                .filter
                .as_ref()
                .map(|f| format!(" matching '{}'", f))
                .unwrap_or_default()
        );
        std::process::exit(1);
    }

    let quests = QuestDatabase::load_from_dir(options.quests_dir.as_deref().unwrap_or(QUESTS_DIR));

    // Folder under tests/scenarios -> scenarios in it
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        let folder = path
            .strip_prefix(base)
            .ok()
            .and_then(Path::parent)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        groups.entry(folder).or_default().push(path);
    }

    println!("Quest Scenarios ({} quests loaded)\n", quests.len());
    let mut tally = Tally::default();

    for (folder, paths) in &groups {
        if !folder.is_empty() {
            println!("{}/", folder);
        }
        for path in paths {
            let label = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let scenario = match parse_test_file(path) {
                Ok(scenario) => scenario,
                Err(message) => {
                    let result = TestResult::Error { message };
                    report(&label, None, &result, options.verbose);
                    tally.record(&result);
                    continue;
                }
            };

            if options.list {
                println!(
                    "  {:<28} quest={:<14} steps={}",
                    label,
                    scenario.setup.quest,
                    scenario.steps.len()
                );
                continue;
            }

            let result = run_test_with(&scenario, &quests);
            report(&label, Some(&scenario), &result, options.verbose);
            tally.record(&result);
        }
        println!();
    }

    if options.list {
        return;
    }

    println!(
        "{} passed, {} failed, {} errors ({} frames simulated)",
        tally.passed, tally.failed, tally.errors, tally.frames
    );
    if !tally.all_passed() {
        std::process::exit(1);
    }
}

fn report(label: &str, scenario: Option<&TestDefinition>, result: &TestResult, verbose: bool) {
    let quest = scenario.map(|s| s.setup.quest.as_str()).unwrap_or("?");
    let status = match result {
        TestResult::Pass { frames } => format!("ok ({} frames)", frames),
        TestResult::Fail { .. } => "FAILED".to_string(),
        TestResult::Error { .. } => "ERROR".to_string(),
    };
    println!("  {:<28} [{}] {}", label, quest, status);

    if verbose {
        if let Some(description) = scenario.and_then(|s| s.description.as_deref()) {
            println!("      {}", description);
        }
    }
    match result {
        TestResult::Pass { .. } => {}
        TestResult::Fail { error } if verbose => println!("      {}", error),
        TestResult::Fail { error } => println!("      {}", error.message),
        TestResult::Error { message } => println!("      {}", message),
    }
}
