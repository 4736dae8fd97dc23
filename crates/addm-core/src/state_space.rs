use crate::error::{DdmError, Result};
use nalgebra::DVector;

/// Discretized evidence axis plus the barrier schedule for one trial.
///
/// Levels run from `-barrier` to `barrier` in `state_step` increments with the
/// middle level pinned to exactly zero. Barriers are scheduled for every time
/// from 0 through `max_time` inclusive.
#[derive(Clone, Debug)]
pub struct StateSpace {
    states: DVector<f64>,
    state_step: f64,
    zero_index: usize,
    barrier_up: Vec<f64>,
    barrier_down: Vec<f64>,
}

impl StateSpace {
    pub fn new(barrier: f64, state_step: f64, max_time: usize, decay: f64) -> Result<Self> {
        if !(barrier > 0.0 && barrier.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "barrier must be positive, got {barrier}"
            )));
        }
        if !(state_step > 0.0 && state_step.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "state step must be positive, got {state_step}"
            )));
        }
        if !(decay >= 0.0 && decay.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "barrier decay must be non-negative, got {decay}"
            )));
        }

        let intervals = 2.0 * barrier / state_step;
        let rounded = intervals.round();
        if rounded < 2.0 || (intervals - rounded).abs() > 1e-9 * rounded {
            return Err(DdmError::InvalidParameter(format!(
                "state step {state_step} does not partition [-{barrier}, {barrier}]"
            )));
        }
        let intervals = rounded as usize;
        if intervals % 2 != 0 {
            return Err(DdmError::InvalidParameter(format!(
                "state step {state_step} does not place a level at zero for barrier {barrier}"
            )));
        }

        // levels are integer multiples of the step counted from zero, so zero is
        // exact and every level has an exact mirror image
        let zero_index = intervals / 2;
        let states = DVector::from_fn(intervals + 1, |i, _| {
            if i == 0 {
                -barrier
            } else if i == intervals {
                barrier
            } else {
                (i as f64 - zero_index as f64) * state_step
            }
        });

        let barrier_up: Vec<f64> = (0..=max_time)
            .map(|t| barrier / (1.0 + decay * t as f64))
            .collect();
        let barrier_down = barrier_up.iter().map(|b| -b).collect();

        Ok(Self {
            states,
            state_step,
            zero_index,
            barrier_up,
            barrier_down,
        })
    }

    pub fn states(&self) -> &DVector<f64> {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state_step(&self) -> f64 {
        self.state_step
    }

    pub fn zero_index(&self) -> usize {
        self.zero_index
    }

    /// Last time step covered by the barrier schedule.
    pub fn max_time(&self) -> usize {
        self.barrier_up.len() - 1
    }

    pub fn barrier_up(&self, t: usize) -> f64 {
        self.barrier_up[t]
    }

    pub fn barrier_down(&self, t: usize) -> f64 {
        self.barrier_down[t]
    }

    /// True when `state` is absorbed at time step `t`.
    pub fn is_absorbed(&self, t: usize, state: f64) -> bool {
        state >= self.barrier_up[t] || state <= self.barrier_down[t]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_levels_symmetric() {
        let space = StateSpace::new(1.0, 0.1, 5, 0.0).unwrap();
        assert_eq!(space.len(), 21);
        assert_eq!(space.states()[space.zero_index()], 0.0);
        assert_abs_diff_eq!(space.states()[13], 0.3, epsilon = 1e-12);
        for i in 0..space.len() {
            let mirrored = space.states()[space.len() - 1 - i];
            assert_eq!(space.states()[i], -mirrored);
        }
        for w in space.states().as_slice().windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_constant_barriers_without_decay() {
        let space = StateSpace::new(1.0, 0.1, 50, 0.0).unwrap();
        assert_eq!(space.max_time(), 50);
        for t in 0..=space.max_time() {
            assert_eq!(space.barrier_up(t), 1.0);
            assert_eq!(space.barrier_down(t), -1.0);
        }
    }

    #[test]
    fn test_decaying_barriers_shrink() {
        let space = StateSpace::new(1.0, 0.1, 50, 0.01).unwrap();
        for t in 1..=space.max_time() {
            assert!(space.barrier_up(t) < space.barrier_up(t - 1));
            assert!(space.barrier_down(t) > space.barrier_down(t - 1));
            assert!(space.barrier_up(t) > space.barrier_down(t));
        }
    }

    #[test]
    fn test_rejects_bad_discretization() {
        assert!(StateSpace::new(0.0, 0.1, 5, 0.0).is_err());
        assert!(StateSpace::new(1.0, 0.0, 5, 0.0).is_err());
        assert!(StateSpace::new(1.0, 0.3, 5, 0.0).is_err());
        // partitions, but no level at zero
        assert!(StateSpace::new(1.0, 0.4, 5, 0.0).is_err());
    }
}
