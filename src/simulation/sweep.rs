//! Parameter sweeps and target reachability
//!
//! Uses Rayon to run many headless launches concurrently. Each launch gets
//! its own driver stepped at the fixed frame rate, so results match what a
//! learner would see at 60 fps.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::FIXED_DT;
use crate::driver::{LaunchParams, RunOutcome, SimulationDriver, TickStatus};
use crate::quest::{QuestConfig, QuestKind};
use crate::target::Target;

/// Grid resolution for sweeps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepResolution {
    pub velocity_step: f64,
    pub angle_step: f64,
    pub mass_step: f64,
    pub height_step: f64,
}

impl Default for SweepResolution {
    fn default() -> Self {
        Self {
            velocity_step: 0.25,
            angle_step: 1.0,
            mass_step: 0.5,
            height_step: 0.5,
        }
    }
}

/// One launch in a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub params: LaunchParams,
    pub success: bool,
    pub error_magnitude: f64,
    pub achieved: f64,
}

/// Reachability of one generator value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityEntry {
    pub target: f64,
    pub hits: usize,
    pub launches: usize,
    /// Lowest-error successful launch
    pub best: Option<LaunchParams>,
}

impl ReachabilityEntry {
    pub fn reachable(&self) -> bool {
        self.hits > 0
    }
}

/// Initialize the global Rayon pool with the given thread count (0 = auto)
pub fn init_parallel(threads: usize) -> Result<(), String> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| format!("Failed to initialize Rayon thread pool: {}", e))?;
    }
    Ok(())
}

/// Run one launch to completion at a fixed frame step
pub fn simulate_launch(config: &QuestConfig, target: Target, params: LaunchParams) -> Option<RunOutcome> {
    let params = config.clamp_params(params);
    let mut driver = SimulationDriver::new(target).with_safety_cap(config.safety_cap);
    let token = driver.start(config.motion_for(&params), params, 0.0).ok()?;
    let max_frames = (config.safety_cap / FIXED_DT).ceil() as u64 + 2;
    for frame in 0..=max_frames {
        if let TickStatus::Finished(outcome) = driver.tick(token, frame as f64 * FIXED_DT) {
            return Some(outcome);
        }
    }
    None
}

fn steps(min: f64, max: f64, step: f64) -> Vec<f64> {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if !(step > 0.0) || !lo.is_finite() || !hi.is_finite() {
        return vec![lo];
    }
    let count = ((hi - lo) / step).floor() as usize;
    let mut values: Vec<f64> = (0..=count).map(|i| lo + i as f64 * step).collect();
    if values.last().is_some_and(|last| hi - last > 1e-9) {
        values.push(hi);
    }
    values
}

/// Every parameter combination the quest's controls can produce at `resolution`
pub fn parameter_grid(config: &QuestConfig, resolution: &SweepResolution) -> Vec<LaunchParams> {
    let l = &config.limits;
    let velocities = steps(l.velocity_min, l.velocity_max, resolution.velocity_step);
    let angles = steps(l.angle_min, l.angle_max, resolution.angle_step);
    let masses = steps(l.mass_min, l.mass_max, resolution.mass_step);
    let heights = steps(l.height_min, l.height_max, resolution.height_step);

    match config.kind {
        QuestKind::RisingOrb => velocities.into_iter().map(LaunchParams::vertical).collect(),
        QuestKind::Archer | QuestKind::GoalShot => velocities
            .iter()
            .flat_map(|&v| angles.iter().map(move |&a| LaunchParams::angled(v, a)))
            .collect(),
        QuestKind::FreeFall => heights.into_iter().map(LaunchParams::dropped).collect(),
        QuestKind::Incline => angles
            .into_iter()
            .map(|a| LaunchParams::angled(0.0, a))
            .collect(),
        QuestKind::MomentumCart => velocities
            .iter()
            .flat_map(|&v| masses.iter().map(move |&m| LaunchParams::angled(v, 0.0).with_mass(m)))
            .collect(),
    }
}

/// Run every grid point against `target` in parallel
pub fn sweep(config: &QuestConfig, target: Target, grid: &[LaunchParams]) -> Vec<SweepPoint> {
    grid.par_iter()
        .filter_map(|params| {
            let outcome = simulate_launch(config, target, *params)?;
            Some(SweepPoint {
                params: outcome.params,
                success: outcome.success(),
                error_magnitude: outcome.evaluation.error_magnitude,
                achieved: outcome.measurement.achieved,
            })
        })
        .collect()
}

/// Hit counts and best launch for every generator value
pub fn reachability_report(config: &QuestConfig, resolution: &SweepResolution) -> Vec<ReachabilityEntry> {
    let grid = parameter_grid(config, resolution);
    config
        .target
        .all_targets(config.kinematics())
        .into_iter()
        .map(|target| {
            let points = sweep(config, target, &grid);
            let hits: Vec<&SweepPoint> = points.iter().filter(|p| p.success).collect();
            let best = hits
                .iter()
                .min_by(|a, b| a.error_magnitude.total_cmp(&b.error_magnitude))
                .map(|p| p.params);
            ReachabilityEntry {
                target: target.value(),
                hits: hits.len(),
                launches: points.len(),
                best,
            }
        })
        .collect()
}

/// Generator values no launch within the limits can hit (stops at the first hit)
pub fn unreachable_targets(config: &QuestConfig) -> Vec<f64> {
    let grid = parameter_grid(config, &SweepResolution::default());
    config
        .target
        .all_targets(config.kinematics())
        .into_iter()
        .filter(|target| {
            !grid.par_iter().any(|params| {
                simulate_launch(config, *target, *params).is_some_and(|o| o.success())
            })
        })
        .map(|target| target.value())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::Kinematics;

    #[test]
    fn test_steps_include_both_ends() {
        let values = steps(15.0, 16.0, 0.3);
        assert_eq!(values.first(), Some(&15.0));
        assert_eq!(values.last(), Some(&16.0));
        assert_eq!(steps(1.0, 1.0, 0.5), vec![1.0]);
    }

    #[test]
    fn test_grid_shape_per_kind() {
        let res = SweepResolution {
            velocity_step: 5.0,
            angle_step: 10.0,
            mass_step: 0.5,
            height_step: 0.5,
        };
        let orb = parameter_grid(&QuestKind::RisingOrb.default_config(), &res);
        assert_eq!(orb.len(), 5); // 15, 20, 25, 30, 35
        let archer = parameter_grid(&QuestKind::Archer.default_config(), &res);
        assert_eq!(archer.len(), 5 * 6); // angles 20..70 by 10
    }

    #[test]
    fn test_simulate_launch_matches_closed_form() {
        let config = QuestKind::Archer.default_config();
        let k = Kinematics::EARTH;
        let target = Target::Distance {
            distance: k.range(25.0, 45.0),
            tolerance: 2.5,
        };
        let outcome = simulate_launch(&config, target, LaunchParams::angled(25.0, 45.0)).unwrap();
        assert!(outcome.success());
        assert!((outcome.state.travel - k.range(25.0, 45.0)).abs() < 1e-9);
    }

    #[test]
    fn test_reachability_of_platforms() {
        let config = QuestKind::RisingOrb.default_config();
        let report = reachability_report(&config, &SweepResolution::default());
        assert_eq!(report.len(), 7);
        for entry in &report {
            assert!(entry.reachable(), "platform {} unreachable", entry.target);
            let best = entry.best.unwrap();
            let ideal = Kinematics::EARTH.required_velocity_for_height(entry.target);
            assert!((best.velocity - ideal).abs() <= 0.5);
        }
    }

    #[test]
    fn test_unreachable_distance_detected() {
        let mut config = QuestKind::Archer.default_config();
        config.target = crate::quest::TargetSpec::Distance {
            distance: crate::quest::TargetValue::OneOf {
                one_of: vec![60.0, 400.0],
            },
            tolerance: 2.5,
        };
        assert_eq!(unreachable_targets(&config), vec![400.0]);
    }
}
