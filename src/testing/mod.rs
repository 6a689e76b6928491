//! Scenario testing system for deterministic quest testing
//!
//! Runs scripted learner actions (launches, stops, answers) against a
//! headless quest and checks the event log, trials and quest state.

use std::path::{Path, PathBuf};

pub mod assertions;
pub mod parser;
pub mod runner;

pub use assertions::{AssertionError, StateValue, WorldState, check_sequence, check_state};
pub use parser::{ExpectedEvent, StateAssertion, Step, TestDefinition, TestExpectations, TestSetup, TrialAssertion};
pub use runner::{TestResult, build_quest, run_test, run_test_with};

/// Default path for test scenarios
pub const SCENARIOS_DIR: &str = "tests/scenarios";

/// Every `*.toml` scenario under `dir`, sorted, keeping those whose path
/// relative to `dir` contains `filter`
pub fn discover_scenarios(dir: &Path, filter: Option<&str>) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == "toml") {
                let rel = path.strip_prefix(dir).unwrap_or(&path).to_string_lossy().into_owned();
                if filter.is_none_or(|f| rel.contains(f)) {
                    found.push(path);
                }
            }
        }
    }
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenarios_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(SCENARIOS_DIR)
    }

    #[test]
    fn test_shipped_scenarios_parse() {
        let paths = discover_scenarios(&scenarios_dir(), None);
        assert!(paths.len() >= 4);
        for path in &paths {
            parser::parse_test_file(path).unwrap();
        }
    }

    #[test]
    fn test_discover_filters_by_relative_path() {
        let dir = scenarios_dir();
        let runs = discover_scenarios(&dir, Some("runs/"));
        assert!(!runs.is_empty());
        assert!(runs.iter().all(|p| p.strip_prefix(&dir).unwrap().starts_with("runs")));
        assert!(discover_scenarios(&dir, Some("no-such-scenario")).is_empty());
        assert!(discover_scenarios(&dir.join("missing"), None).is_empty());
    }
}
