use crate::params::ModelParameters;
use crate::trial::{FixationItem, Trial};

/// Mean of the evidence increment at a given time step.
pub trait MeanIncrement: Send + Sync {
    fn mean(&self, step: usize) -> f64;
}

/// Plain DDM: the increment depends only on the value difference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantDrift {
    pub mean: f64,
}

impl ConstantDrift {
    pub fn new(d: f64, value_left: f64, value_right: f64) -> Self {
        Self {
            mean: d * (value_left - value_right),
        }
    }
}

impl MeanIncrement for ConstantDrift {
    fn mean(&self, _step: usize) -> f64 {
        self.mean
    }
}

/// Increment while `item` is being looked at, discounting the other item by `theta`.
pub fn attentional_mean(
    d: f64,
    theta: f64,
    value_left: f64,
    value_right: f64,
    item: FixationItem,
) -> f64 {
    match item {
        FixationItem::Left => d * (value_left - theta * value_right),
        FixationItem::Right => d * (theta * value_left - value_right),
        FixationItem::Latency | FixationItem::Transition => 0.0,
    }
}

/// aDDM: the increment follows the fixation occupying each time step.
///
/// Stored as one `(end_step, mean)` segment per fixation, with `end_step`
/// exclusive, so the cost does not grow with fixation length.
#[derive(Clone, Debug, PartialEq)]
pub struct FixationDrift {
    segments: Vec<(usize, f64)>,
}

impl FixationDrift {
    pub fn new(d: f64, theta: f64, trial: &Trial, time_step_ms: u32) -> Self {
        let mut segments = Vec::with_capacity(trial.fixations.len());
        let mut end = 0usize;
        for fixation in &trial.fixations {
            let steps = (fixation.duration / time_step_ms.max(1)) as usize;
            if steps == 0 {
                continue;
            }
            end = end.saturating_add(steps);
            let mean = attentional_mean(d, theta, trial.value_left, trial.value_right, fixation.item);
            segments.push((end, mean));
        }
        Self { segments }
    }

    /// Number of time steps covered by the fixations.
    pub fn len(&self) -> usize {
        self.segments.last().map_or(0, |(end, _)| *end)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl MeanIncrement for FixationDrift {
    fn mean(&self, step: usize) -> f64 {
        let idx = self.segments.partition_point(|(end, _)| *end <= step);
        match self.segments.get(idx) {
            Some((_, mean)) => *mean,
            None => self.segments.last().map_or(0.0, |(_, mean)| *mean),
        }
    }
}

/// Drift for `params` applied to `trial`: attentional when `theta` is set.
pub enum TrialDrift {
    Constant(ConstantDrift),
    Fixation(FixationDrift),
}

impl TrialDrift {
    pub fn for_trial(params: &ModelParameters, trial: &Trial, time_step_ms: u32) -> Self {
        match params.theta {
            Some(theta) => TrialDrift::Fixation(FixationDrift::new(params.d, theta, trial, time_step_ms)),
            None => TrialDrift::Constant(ConstantDrift::new(params.d, trial.value_left, trial.value_right)),
        }
    }
}

impl MeanIncrement for TrialDrift {
    fn mean(&self, step: usize) -> f64 {
        match self {
            TrialDrift::Constant(drift) => drift.mean(step),
            TrialDrift::Fixation(drift) => drift.mean(step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::{Choice, Fixation};
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_drift() {
        let drift = ConstantDrift::new(0.006, 3.0, 1.0);
        assert_relative_eq!(drift.mean(0), 0.012);
        assert_relative_eq!(drift.mean(500), 0.012);
    }

    #[test]
    fn test_fixation_schedule() {
        let trial = Trial::new(600, Choice::Left, 2.0, 0.5).with_fixations(vec![
            Fixation::new(FixationItem::Latency, 200),
            Fixation::new(FixationItem::Left, 300),
            Fixation::new(FixationItem::Transition, 50),
            Fixation::new(FixationItem::Right, 55),
        ]);
        let drift = FixationDrift::new(0.01, 0.5, &trial, 10);
        assert_eq!(drift.len(), 20 + 30 + 5 + 5);
        assert_eq!(drift.mean(0), 0.0);
        assert_relative_eq!(drift.mean(20), 0.01 * (2.0 - 0.5 * 0.5));
        assert_eq!(drift.mean(52), 0.0);
        assert_relative_eq!(drift.mean(56), 0.01 * (0.5 * 2.0 - 0.5));
        // past the recorded sequence
        assert_relative_eq!(drift.mean(100), drift.mean(59));
    }

    #[test]
    fn test_long_fixation_stays_compact() {
        let trial = Trial::new(600, Choice::Left, 2.0, 0.5).with_fixations(vec![
            Fixation::new(FixationItem::Left, u32::MAX),
            Fixation::new(FixationItem::Right, u32::MAX),
        ]);
        let drift = FixationDrift::new(0.01, 0.5, &trial, 10);
        let per_fixation = (u32::MAX / 10) as usize;
        assert_eq!(drift.len(), 2 * per_fixation);
        assert_relative_eq!(drift.mean(per_fixation - 1), 0.01 * (2.0 - 0.5 * 0.5));
        assert_relative_eq!(drift.mean(per_fixation), 0.01 * (0.5 * 2.0 - 0.5));
    }

    #[test]
    fn test_short_fixations_skipped() {
        let trial = Trial::new(600, Choice::Left, 2.0, 1.0).with_fixations(vec![
            Fixation::new(FixationItem::Latency, 100),
            Fixation::new(FixationItem::Transition, 4),
            Fixation::new(FixationItem::Left, 30),
        ]);
        let drift = FixationDrift::new(0.01, 0.5, &trial, 10);
        assert_eq!(drift.len(), 13);
        assert_eq!(drift.mean(9), 0.0);
        assert_relative_eq!(drift.mean(10), 0.01 * (2.0 - 0.5));
    }

    #[test]
    fn test_empty_sequence_has_no_drift() {
        let trial = Trial::new(600, Choice::Left, 2.0, 1.0);
        let drift = FixationDrift::new(0.01, 0.5, &trial, 10);
        assert!(drift.is_empty());
        assert_eq!(drift.mean(3), 0.0);
    }
}
