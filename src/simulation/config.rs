//! Simulation configuration

use serde::{Deserialize, Serialize};

use crate::driver::LaunchParams;

use super::sweep::SweepResolution;

/// Simulation mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SimMode {
    /// Play the scripted launches through the headless app
    #[default]
    Run,
    /// Sweep the quest's parameter grid against every target value
    Sweep,
    /// Report which target values can be hit within the launch limits
    Reachability,
    /// List the available quests
    List,
}

/// Configuration for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation mode
    pub mode: SimMode,
    /// Quest name or kind (looked up in the quest directory, then presets)
    pub quest: String,
    /// Explicit quest TOML file (overrides `quest`)
    pub quest_file: Option<String>,
    /// Directory of quest TOML files
    pub quests_dir: String,
    /// Launches to play in order
    pub launches: Vec<LaunchParams>,
    /// Assessment answers (question id, answer), submitted after the launches
    pub answers: Vec<(String, String)>,
    /// RNG seed for target generation (None = quest seed or entropy)
    pub seed: Option<u64>,
    /// Frames per second of the headless clock
    pub fps: f64,
    /// Sweep grid resolution
    pub resolution: SweepResolution,
    /// Output file path (None = stdout)
    pub output_file: Option<String>,
    /// Print the compact event log to stderr
    pub event_log: bool,
    /// Suppress progress output
    pub quiet: bool,
    /// Number of parallel threads (0 = auto)
    pub parallel: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mode: SimMode::Run,
            quest: "archer".to_string(),
            quest_file: None,
            quests_dir: crate::quest::QUESTS_DIR.to_string(),
            launches: Vec::new(),
            answers: Vec::new(),
            seed: None,
            fps: 60.0,
            resolution: SweepResolution::default(),
            output_file: None,
            event_log: false,
            quiet: false,
            parallel: 0,
        }
    }
}

/// Template simulation settings (checked into git)
pub const SIM_SETTINGS_TEMPLATE: &str = "config/simulation_settings.template.json";
/// Local simulation settings (gitignored, user's custom settings)
pub const SIM_SETTINGS_FILE: &str = "config/simulation_settings.json";

/// Parse `velocity[,angle[,mass[,height]]]`
pub fn parse_launch(spec: &str) -> Option<LaunchParams> {
    let values: Vec<f64> = spec
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let mut params = LaunchParams::angled(*values.first()?, values.get(1).copied().unwrap_or(0.0));
    if let Some(mass) = values.get(2) {
        params.mass = *mass;
    }
    if let Some(height) = values.get(3) {
        params.height = *height;
    }
    Some(params)
}

impl SimConfig {
    /// Load configuration from a JSON settings file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", path, e))
    }

    /// Load configuration from default config files
    /// Priority: local settings > template settings > built-in defaults
    pub fn from_config_files() -> Self {
        if let Ok(config) = Self::from_file(SIM_SETTINGS_FILE) {
            return config;
        }
        if let Ok(config) = Self::from_file(SIM_SETTINGS_TEMPLATE) {
            return config;
        }
        Self::default()
    }

    /// Parse configuration from command line arguments
    pub fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::parse_args(&args)
    }

    /// Parse an argument list (first entry is the program name)
    pub fn parse_args(args: &[String]) -> Self {
        let mut config = Self::from_config_files();

        // Explicit settings file replaces the defaults before CLI overrides
        if let Some(pos) = args.iter().position(|a| a == "--settings") {
            if let Some(path) = args.get(pos + 1) {
                match Self::from_file(path) {
                    Ok(loaded) => config = loaded,
                    Err(e) => eprintln!("Warning: {}", e),
                }
            }
        }

        config.apply_overrides(args)
    }

    /// Apply CLI flags on top of loaded settings. The first `--launch` or
    /// `--answer` replaces the list from the settings file.
    pub fn apply_overrides(mut self, args: &[String]) -> Self {
        let config = &mut self;
        let mut cli_launches = false;
        let mut cli_answers = false;
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--settings" => {
                    i += 1;
                }
                "--quest" => {
                    if i + 1 < args.len() {
                        config.quest = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--quest-file" => {
                    if i + 1 < args.len() {
                        config.quest_file = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--quests-dir" => {
                    if i + 1 < args.len() {
                        config.quests_dir = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--launch" => {
                    if i + 1 < args.len() {
                        if !cli_launches {
                            config.launches.clear();
                            cli_launches = true;
                        }
                        match parse_launch(&args[i + 1]) {
                            Some(params) => config.launches.push(params),
                            None => eprintln!("Warning: ignoring bad --launch '{}'", args[i + 1]),
                        }
                        i += 1;
                    }
                }
                "--answer" => {
                    if i + 1 < args.len() {
                        if !cli_answers {
                            config.answers.clear();
                            cli_answers = true;
                        }
                        match args[i + 1].split_once('=') {
                            Some((id, answer)) => {
                                config.answers.push((id.trim().to_string(), answer.trim().to_string()))
                            }
                            None => eprintln!("Warning: ignoring bad --answer '{}'", args[i + 1]),
                        }
                        i += 1;
                    }
                }
                "--sweep" => {
                    config.mode = SimMode::Sweep;
                }
                "--reachability" => {
                    config.mode = SimMode::Reachability;
                }
                "--list" => {
                    config.mode = SimMode::List;
                }
                "--seed" => {
                    if i + 1 < args.len() {
                        config.seed = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--fps" => {
                    if i + 1 < args.len() {
                        config.fps = args[i + 1].parse().unwrap_or(60.0);
                        i += 1;
                    }
                }
                "--velocity-step" => {
                    if i + 1 < args.len() {
                        if let Ok(step) = args[i + 1].parse() {
                            config.resolution.velocity_step = step;
                        }
                        i += 1;
                    }
                }
                "--angle-step" => {
                    if i + 1 < args.len() {
                        if let Ok(step) = args[i + 1].parse() {
                            config.resolution.angle_step = step;
                        }
                        i += 1;
                    }
                }
                "--output" => {
                    if i + 1 < args.len() {
                        config.output_file = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--events" => {
                    config.event_log = true;
                }
                "--quiet" | "-q" => {
                    config.quiet = true;
                }
                "--parallel" => {
                    if i + 1 < args.len() {
                        config.parallel = args[i + 1].parse().unwrap_or(0);
                        i += 1;
                    }
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        self
    }
}

fn print_help() {
    println!(
        r#"Quest Simulation Tool - Headless kinematics quest runner

USAGE:
    cargo run --bin simulate -- [OPTIONS]

OPTIONS:
    --settings <FILE>       Load settings from JSON file (CLI args override file settings)
    --quest <NAME>          Quest name or kind (default: archer)
    --quest-file <FILE>     Load the quest from a TOML file
    --quests-dir <DIR>      Quest directory (default: config/quests)
    --launch <V[,A[,M[,H]]]> Launch: velocity, angle, mass, height (repeatable, replaces settings)
    --answer <ID=ANSWER>    Assessment answer submitted after the launches (repeatable)
    --sweep                 Sweep the parameter grid against every target value
    --reachability          Report which target values can be hit
    --list                  List available quests
    --seed <N>              RNG seed for target generation
    --fps <N>               Headless frame rate (default: 60)
    --velocity-step <X>     Sweep velocity resolution (default: 0.25)
    --angle-step <X>        Sweep angle resolution (default: 1)
    --output <FILE>         Output JSON to file (default: stdout)
    --events                Print the compact event log to stderr
    --quiet, -q             Suppress progress output
    --parallel <N>          Run sweeps with N threads
    --help, -h              Show this help

EXAMPLES:
    # Rising orb with the analytic launch speed for a 30 m platform
    cargo run --bin simulate -- --quest rising-orb --seed 3 --launch 24.26

    # Three archer shots then the quiz
    cargo run --bin simulate -- --quest archer --launch 25,45 --launch 28,40 --launch 22,50 \
        --answer best-angle=45 --answer complementary=60 --answer mass=no --answer your-range=60

    # Which platform heights can be reached?
    cargo run --bin simulate -- --quest rising-orb --reachability

SETTINGS FILE FORMAT (JSON):
    {{
      "quest": "archer",
      "launches": [{{ "velocity": 25.0, "angle_degrees": 45.0 }}],
      "parallel": 4
    }}
"#
    );
}
