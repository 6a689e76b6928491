//! Quest Simulation Tool - Headless quest runner
//!
//! Play scripted launches through a quest without rendering, sweep the
//! parameter space, or check which targets can be hit.
//!
//! Usage:
//!   cargo run --bin simulate -- --help
//!   cargo run --bin simulate -- --quest rising-orb --seed 3 --launch 24.26
//!   cargo run --bin simulate -- --quest archer --sweep --output sweep.json
//!   cargo run --bin simulate -- --quest incline --reachability

use kinequest::simulation::{SimConfig, run_simulation};

fn main() {
    let config = SimConfig::from_args();
    if let Err(e) = run_simulation(config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
