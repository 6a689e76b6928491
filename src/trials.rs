//! Trial recorder and accuracy scoring
//!
//! History is append-only; every aggregate is a pure reduction recomputed on
//! demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCURACY_ANGLE_WEIGHT, ACCURACY_MAX_ANGLE_DIFF, ACCURACY_MAX_VELOCITY_DIFF,
    ACCURACY_VELOCITY_WEIGHT, FLOAT_EPSILON,
};
use crate::driver::{LaunchParams, RunOutcome, RunPhase};
use crate::kinematics::Kinematics;
use crate::target::DirectionalHint;

/// Measured quantities of one run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialMetrics {
    /// Distance along the main axis (m)
    pub distance: f64,
    /// Peak height (m)
    pub height: f64,
    /// Duration (s)
    pub time: f64,
    /// Final speed (m/s)
    pub speed: f64,
    /// Magnitude of average acceleration (m/s²)
    pub acceleration: f64,
}

/// Metric selector for averages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialMetric {
    Distance,
    Height,
    Time,
    Speed,
    Acceleration,
    ErrorPercent,
}

impl TrialMetric {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "distance" | "range" => Some(TrialMetric::Distance),
            "height" => Some(TrialMetric::Height),
            "time" | "duration" => Some(TrialMetric::Time),
            "speed" | "velocity" => Some(TrialMetric::Speed),
            "acceleration" => Some(TrialMetric::Acceleration),
            "error" | "error-percent" => Some(TrialMetric::ErrorPercent),
            _ => None,
        }
    }
}

/// One recorded run, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// 1-based, strictly increasing
    pub trial_number: u32,
    pub params: LaunchParams,
    pub metrics: TrialMetrics,
    pub achieved: f64,
    pub required: f64,
    pub error_percent: f64,
    pub success: bool,
    pub landed_on_target: bool,
    pub phase: RunPhase,
    pub hint: DirectionalHint,
    /// Weighted parameter accuracy (0-100) for quests that score it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Trial {
    pub fn metric(&self, metric: TrialMetric) -> f64 {
        match metric {
            TrialMetric::Distance => self.metrics.distance,
            TrialMetric::Height => self.metrics.height,
            TrialMetric::Time => self.metrics.time,
            TrialMetric::Speed => self.metrics.speed,
            TrialMetric::Acceleration => self.metrics.acceleration,
            TrialMetric::ErrorPercent => self.error_percent,
        }
    }
}

/// |achieved − required| / required × 100, guarded for required ≈ 0
pub fn error_percent(achieved: f64, required: f64) -> f64 {
    if !achieved.is_finite() || !required.is_finite() {
        return 100.0;
    }
    if required.abs() < FLOAT_EPSILON {
        return if achieved.abs() < FLOAT_EPSILON { 0.0 } else { 100.0 };
    }
    (achieved - required).abs() / required.abs() * 100.0
}

/// Aggregate over one angle bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleBucket {
    /// Inclusive lower edge (degrees)
    pub start: f64,
    /// Exclusive upper edge (degrees)
    pub end: f64,
    pub count: usize,
    pub average_error: f64,
    pub success_rate: f64,
}

/// Append-only trial list for one quest screen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialHistory {
    trials: Vec<Trial>,
}

impl TrialHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trial for a finished run
    pub fn record(&mut self, outcome: &RunOutcome, accuracy: Option<f64>) -> &Trial {
        self.record_at(outcome, accuracy, Utc::now())
    }

    pub fn record_at(
        &mut self,
        outcome: &RunOutcome,
        accuracy: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> &Trial {
        let trial_number = self.trials.len() as u32 + 1;
        let measurement = outcome.measurement;
        let trial = Trial {
            trial_number,
            params: outcome.params,
            metrics: TrialMetrics {
                distance: outcome.state.travel,
                height: outcome.state.max_height,
                time: outcome.state.t,
                speed: outcome.state.speed(),
                acceleration: outcome.average_acceleration(),
            },
            achieved: measurement.achieved,
            required: measurement.required,
            error_percent: error_percent(measurement.achieved, measurement.required),
            success: outcome.success(),
            landed_on_target: outcome.landed_on_target(),
            phase: outcome.phase,
            hint: outcome.evaluation.hint,
            accuracy: accuracy.map(|a| a.clamp(0.0, 100.0)),
            timestamp,
        };
        self.trials.push(trial);
        &self.trials[self.trials.len() - 1]
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn last(&self) -> Option<&Trial> {
        self.trials.last()
    }

    /// By 1-based trial number
    pub fn get(&self, trial_number: u32) -> Option<&Trial> {
        let index = (trial_number as usize).checked_sub(1)?;
        self.trials.get(index)
    }

    /// The most recent `n` trials, oldest first
    pub fn recent(&self, n: usize) -> &[Trial] {
        let start = self.trials.len().saturating_sub(n);
        &self.trials[start..]
    }

    pub fn success_count(&self) -> usize {
        self.trials.iter().filter(|t| t.success).count()
    }

    /// Fraction of successful trials (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.trials.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.trials.len() as f64
        }
    }

    pub fn average_error(&self) -> Option<f64> {
        self.average(TrialMetric::ErrorPercent)
    }

    /// Mean of a metric, None when there are no trials
    pub fn average(&self, metric: TrialMetric) -> Option<f64> {
        if self.trials.is_empty() {
            return None;
        }
        let sum: f64 = self.trials.iter().map(|t| t.metric(metric)).sum();
        Some(sum / self.trials.len() as f64)
    }

    /// Lowest error (earliest wins ties)
    pub fn best(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .reduce(|best, t| if t.error_percent < best.error_percent { t } else { best })
    }

    /// Highest error (earliest wins ties)
    pub fn worst(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .reduce(|worst, t| if t.error_percent > worst.error_percent { t } else { worst })
    }

    pub fn average_accuracy(&self) -> Option<f64> {
        let scores: Vec<f64> = self.trials.iter().filter_map(|t| t.accuracy).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    /// Group trials into angle buckets of `bucket_width` degrees, ascending
    pub fn breakdown_by_angle(&self, bucket_width: f64) -> Vec<AngleBucket> {
        if !(bucket_width.is_finite() && bucket_width > 0.0) {
            return Vec::new();
        }
        let mut buckets: Vec<(i64, Vec<&Trial>)> = Vec::new();
        for trial in &self.trials {
            let key = (trial.params.angle_degrees / bucket_width).floor() as i64;
            match buckets.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(trial),
                None => buckets.push((key, vec![trial])),
            }
        }
        buckets.sort_by_key(|(key, _)| *key);
        buckets
            .into_iter()
            .map(|(key, members)| {
                let count = members.len();
                let errors: f64 = members.iter().map(|t| t.error_percent).sum();
                let successes = members.iter().filter(|t| t.success).count();
                AngleBucket {
                    start: key as f64 * bucket_width,
                    end: (key + 1) as f64 * bucket_width,
                    count,
                    average_error: errors / count as f64,
                    success_rate: successes as f64 / count as f64,
                }
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(&self.trials)
            .map_err(|e| format!("Failed to serialize trial history: {}", e))
    }
}

// =============================================================================
// ACCURACY SCORE
// =============================================================================

/// Weights and zero-score limits for the two-parameter accuracy score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyWeights {
    pub velocity_weight: f64,
    pub angle_weight: f64,
    pub max_velocity_diff: f64,
    pub max_angle_diff: f64,
}

impl Default for AccuracyWeights {
    fn default() -> Self {
        Self {
            velocity_weight: ACCURACY_VELOCITY_WEIGHT,
            angle_weight: ACCURACY_ANGLE_WEIGHT,
            max_velocity_diff: ACCURACY_MAX_VELOCITY_DIFF,
            max_angle_diff: ACCURACY_MAX_ANGLE_DIFF,
        }
    }
}

/// max(0, 100 − |diff| / max_allowed × 100)
pub fn component_score(diff: f64, max_allowed: f64) -> f64 {
    if !diff.is_finite() || !(max_allowed > 0.0) {
        return 0.0;
    }
    (100.0 - diff.abs() / max_allowed * 100.0).clamp(0.0, 100.0)
}

/// Weighted combination of velocity and angle errors, clamped to 0..100
pub fn accuracy_score(velocity_diff: f64, angle_diff: f64, weights: &AccuracyWeights) -> f64 {
    let score = weights.velocity_weight * component_score(velocity_diff, weights.max_velocity_diff)
        + weights.angle_weight * component_score(angle_diff, weights.max_angle_diff);
    score.clamp(0.0, 100.0)
}

/// Accuracy of chosen launch parameters against the ideal ones for `distance`
///
/// The ideal velocity is the one that reaches `distance` at the chosen angle;
/// the ideal angle is whichever range solution at the chosen velocity lies
/// closest to the chosen angle. An unreachable distance scores the angle at 0.
pub fn range_accuracy(
    kinematics: &Kinematics,
    params: &LaunchParams,
    distance: f64,
    weights: &AccuracyWeights,
) -> f64 {
    let ideal_velocity = kinematics.required_velocity_for_range(distance, params.angle_degrees);
    let velocity_diff = if ideal_velocity > 0.0 {
        params.velocity - ideal_velocity
    } else {
        f64::INFINITY
    };
    let angle_diff = match kinematics.launch_angle_for_range(params.velocity, distance) {
        Some(low) => {
            let high = 90.0 - low;
            (params.angle_degrees - low)
                .abs()
                .min((params.angle_degrees - high).abs())
        }
        None => f64::INFINITY,
    };
    accuracy_score(velocity_diff, angle_diff, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SimulationState;
    use crate::kinematics::Point2;
    use crate::motion::Integration;
    use crate::target::{ConstraintResult, Measurement};

    fn outcome(angle: f64, achieved: f64, required: f64, success: bool) -> RunOutcome {
        RunOutcome {
            run: 1,
            phase: if success { RunPhase::Landed } else { RunPhase::Stopped },
            params: LaunchParams::angled(25.0, angle),
            state: SimulationState {
                t: 2.0,
                position: Point2::new(achieved, 0.0),
                velocity: Point2::new(10.0, 0.0),
                max_height: 5.0,
                travel: achieved,
            },
            evaluation: ConstraintResult {
                is_valid: true,
                within_tolerance: success,
                error_magnitude: (achieved - required).abs(),
                hint: DirectionalHint::OnTarget,
            },
            measurement: Measurement { achieved, required },
            launch_speed: 25.0,
            initial_velocity: Point2::new(10.0, 10.0),
            integration: Integration::ClosedForm,
        }
    }

    #[test]
    fn test_trial_numbers_are_sequential() {
        let mut history = TrialHistory::new();
        for i in 0..5 {
            history.record(&outcome(45.0, 60.0 + i as f64, 63.7, true), None);
        }
        assert_eq!(history.len(), 5);
        for (i, trial) in history.trials().iter().enumerate() {
            assert_eq!(trial.trial_number, i as u32 + 1);
        }
        assert_eq!(history.get(3).map(|t| t.trial_number), Some(3));
        assert!(history.get(0).is_none());
    }

    #[test]
    fn test_error_percent_guards_zero() {
        assert!((error_percent(55.0, 50.0) - 10.0).abs() < 1e-12);
        assert_eq!(error_percent(0.0, 0.0), 0.0);
        assert_eq!(error_percent(3.0, 0.0), 100.0);
        assert_eq!(error_percent(f64::NAN, 10.0), 100.0);
    }

    #[test]
    fn test_aggregates() {
        let mut history = TrialHistory::new();
        history.record(&outcome(30.0, 50.0, 100.0, false), None); // 50%
        history.record(&outcome(45.0, 100.0, 100.0, true), None); // 0%
        history.record(&outcome(47.0, 110.0, 100.0, true), None); // 10%

        assert!((history.average_error().unwrap() - 20.0).abs() < 1e-9);
        assert!((history.success_rate() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(history.best().unwrap().trial_number, 2);
        assert_eq!(history.worst().unwrap().trial_number, 1);
        assert!((history.average(TrialMetric::Acceleration).unwrap() - 7.5).abs() < 1e-12);

        let recent = history.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].trial_number, 2);
        assert_eq!(history.recent(10).len(), 3);
    }

    #[test]
    fn test_empty_history() {
        let history = TrialHistory::new();
        assert!(history.average_error().is_none());
        assert!(history.best().is_none());
        assert_eq!(history.success_rate(), 0.0);
        assert!(history.breakdown_by_angle(10.0).is_empty());
    }

    #[test]
    fn test_breakdown_by_angle() {
        let mut history = TrialHistory::new();
        history.record(&outcome(32.0, 50.0, 100.0, false), None);
        history.record(&outcome(45.0, 100.0, 100.0, true), None);
        history.record(&outcome(48.0, 90.0, 100.0, true), None);

        let buckets = history.breakdown_by_angle(10.0);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].start, 30.0);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[1].start, 40.0);
        assert_eq!(buckets[1].count, 2);
        assert!((buckets[1].average_error - 5.0).abs() < 1e-9);
        assert_eq!(buckets[1].success_rate, 1.0);
    }

    #[test]
    fn test_accuracy_score_weights() {
        let weights = AccuracyWeights::default();
        assert_eq!(accuracy_score(0.0, 0.0, &weights), 100.0);
        // Half the allowed velocity error, perfect angle
        assert!((accuracy_score(5.0, 0.0, &weights) - 70.0).abs() < 1e-9);
        assert_eq!(accuracy_score(50.0, 90.0, &weights), 0.0);
    }

    #[test]
    fn test_range_accuracy_perfect_shot() {
        let k = Kinematics::EARTH;
        let params = LaunchParams::angled(25.0, 45.0);
        let score = range_accuracy(&k, &params, k.range(25.0, 45.0), &AccuracyWeights::default());
        assert!((score - 100.0).abs() < 1e-6);

        // Complementary angle is just as ideal
        let high = LaunchParams::angled(25.0, 60.0);
        let score = range_accuracy(&k, &high, k.range(25.0, 30.0), &AccuracyWeights::default());
        assert!((score - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_export_json() {
        let mut history = TrialHistory::new();
        history.record(&outcome(45.0, 63.0, 63.7, true), Some(120.0));
        let json = history.to_json().unwrap();
        assert!(json.contains("\"trial_number\": 1"));
        assert_eq!(history.last().unwrap().accuracy, Some(100.0));
    }
}
