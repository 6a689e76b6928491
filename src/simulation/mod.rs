//! Headless quest simulation
//!
//! Plays quests without rendering: scripted launch sequences through the
//! Bevy app, parallel parameter sweeps, and target reachability reports.

pub mod app_builder;
pub mod config;
pub mod runner;
pub mod sweep;

pub use app_builder::HeadlessAppBuilder;
pub use config::{SIM_SETTINGS_FILE, SIM_SETTINGS_TEMPLATE, SimConfig, SimMode, parse_launch};
pub use runner::{HeadlessQuest, RunReport, SweepReport, resolve_quest, run_quest, run_simulation};
pub use sweep::{
    ReachabilityEntry, SweepPoint, SweepResolution, init_parallel, parameter_grid,
    reachability_report, simulate_launch, sweep, unreachable_targets,
};
