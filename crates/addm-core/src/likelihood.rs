//! Discretized Fokker-Planck propagation with absorbing barriers.
//!
//! Probability mass starts at zero evidence and is pushed forward one time
//! bin at a time through a Gaussian transition kernel. Each live level owns
//! the cell around it, and the outermost live cells reach the barriers, so an
//! increment either lands in a cell or crosses a barrier. Crossings are booked
//! against the bin they happen in: after `k` increments the crossing sits at
//! index `k`, which is the bin of a walk that stops at `k * time_step_ms`.

use crate::config::{EngineConfig, TransitionKernel};
use crate::drift::{MeanIncrement, TrialDrift};
use crate::error::{DdmError, Result};
use crate::params::ModelParameters;
use crate::state_space::StateSpace;
use crate::trial::Trial;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::{trace, warn};

/// Full record of one propagation, for diagnostics and plots.
#[derive(Clone, Debug)]
pub struct LikelihoodTrace {
    /// Surviving mass per time bin; index 0 is the initial distribution.
    pub masses: Vec<DVector<f64>>,
    /// Mass absorbed at the upper barrier in each bin.
    pub up_crossing: Vec<f64>,
    /// Mass absorbed at the lower barrier in each bin.
    pub down_crossing: Vec<f64>,
    /// `|mass out - mass in|` for each bin before renormalization.
    pub conservation_error: Vec<f64>,
    pub likelihood: f64,
}

impl LikelihoodTrace {
    /// Surviving plus absorbed mass up to and including bin `t`, or `None`
    /// when `t` is past the trace or the masses were not kept.
    pub fn total_mass(&self, t: usize) -> Option<f64> {
        let surviving = self.masses.get(t)?.sum();
        let up = self.up_crossing.get(..=t)?.iter().sum::<f64>();
        let down = self.down_crossing.get(..=t)?.iter().sum::<f64>();
        Some(surviving + up + down)
    }

    /// Largest pre-renormalization error over the whole propagation.
    pub fn worst_conservation_error(&self) -> f64 {
        self.conservation_error.iter().copied().fold(0.0, f64::max)
    }
}

/// Cumulative and tail probability of one increment at a cell edge.
#[derive(Clone, Copy, Debug)]
struct Edge {
    cdf: f64,
    sf: f64,
    upper_tail: bool,
}

impl Edge {
    fn at(normal: &Normal, mean: f64, offset: f64) -> Self {
        Self {
            cdf: normal.cdf(offset),
            sf: normal.sf(offset),
            upper_tail: offset > mean,
        }
    }

    /// Probability of an increment between `self` and `hi`, subtracting in
    /// whichever tail keeps the precision.
    fn until(self, hi: Edge) -> f64 {
        let p = if self.upper_tail {
            self.sf - hi.sf
        } else {
            hi.cdf - self.cdf
        };
        p.max(0.0)
    }
}

/// One-step transition: level-to-level matrix plus per-source crossing
/// probabilities.
#[derive(Clone, Debug)]
struct Transition {
    matrix: DMatrix<f64>,
    up: DVector<f64>,
    down: DVector<f64>,
}

impl Transition {
    fn empty(n: usize) -> Self {
        Self {
            matrix: DMatrix::zeros(n, n),
            up: DVector::zeros(n),
            down: DVector::zeros(n),
        }
    }

    fn build(kernel: TransitionKernel, space: &StateSpace, time: usize, mean: f64, sigma: f64) -> Result<Self> {
        let normal = Normal::new(mean, sigma)
            .map_err(|e| DdmError::InvalidParameter(format!("increment distribution: {e}")))?;
        let states = space.states();
        let upper = space.barrier_up(time);
        let lower = space.barrier_down(time);

        let up = states.map(|level| normal.sf(upper - level));
        let down = states.map(|level| normal.cdf(lower - level));
        let matrix = match kernel {
            TransitionKernel::CellIntegrated => Self::cell_integrated(space, time, &normal, mean),
            TransitionKernel::PointDensity => Self::point_density(space, time, &normal),
        };
        Ok(Self { matrix, up, down })
    }

    fn cell_integrated(space: &StateSpace, time: usize, normal: &Normal, mean: f64) -> DMatrix<f64> {
        let n = space.len();
        let states = space.states();
        let h = space.state_step();
        let mut matrix = DMatrix::<f64>::zeros(n, n);

        let live: Vec<usize> = (0..n).filter(|&j| !space.is_absorbed(time, states[j])).collect();
        let (Some(&first), Some(&last)) = (live.first(), live.last()) else {
            return matrix;
        };

        // inner cell edges sit at (m + 1/2) * h from the source level, for
        // m in -n..n; entry k holds m = k - n
        let half: Vec<Edge> = (0..2 * n)
            .map(|k| Edge::at(normal, mean, (k as f64 - n as f64 + 0.5) * h))
            .collect();
        let upper = space.barrier_up(time);
        let lower = space.barrier_down(time);
        let to_upper: Vec<Edge> = states.iter().map(|x| Edge::at(normal, mean, upper - x)).collect();
        let to_lower: Vec<Edge> = states.iter().map(|x| Edge::at(normal, mean, lower - x)).collect();

        for to in first..=last {
            for from in 0..n {
                let offset = to + n - from;
                let lo = if to == first { to_lower[from] } else { half[offset - 1] };
                let hi = if to == last { to_upper[from] } else { half[offset] };
                matrix[(to, from)] = lo.until(hi);
            }
        }
        matrix
    }

    fn point_density(space: &StateSpace, time: usize, normal: &Normal) -> DMatrix<f64> {
        let states = space.states();
        let h = space.state_step();
        DMatrix::from_fn(space.len(), space.len(), |to, from| {
            if space.is_absorbed(time, states[to]) {
                0.0
            } else {
                h * normal.pdf(states[to] - states[from])
            }
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct LikelihoodEngine {
    config: EngineConfig,
}

impl LikelihoodEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Likelihood of the trial's exact (reaction time, choice) pair.
    ///
    /// Uses the attentional drift when `params.theta` is set, the plain
    /// value-difference drift otherwise.
    pub fn likelihood(&self, params: &ModelParameters, trial: &Trial) -> Result<f64> {
        let drift = TrialDrift::for_trial(params, trial, self.config.time_step_ms);
        self.likelihood_with(params, trial, &drift)
    }

    /// Likelihood under a caller-supplied mean increment.
    pub fn likelihood_with<M>(&self, params: &ModelParameters, trial: &Trial, drift: &M) -> Result<f64>
    where
        M: MeanIncrement + ?Sized,
    {
        Ok(self.propagate(params, trial, drift, false)?.likelihood)
    }

    /// Likelihood together with every mass snapshot and crossing series.
    pub fn trace(&self, params: &ModelParameters, trial: &Trial) -> Result<LikelihoodTrace> {
        let drift = TrialDrift::for_trial(params, trial, self.config.time_step_ms);
        self.propagate(params, trial, &drift, true)
    }

    fn propagate<M>(
        &self,
        params: &ModelParameters,
        trial: &Trial,
        drift: &M,
        keep_masses: bool,
    ) -> Result<LikelihoodTrace>
    where
        M: MeanIncrement + ?Sized,
    {
        self.config.validate()?;
        params.validate()?;
        let max_time = trial.max_time(self.config.time_step_ms)?;
        let space = StateSpace::new(params.barrier, self.config.state_step, max_time, params.decay)?;
        let n = space.len();

        let mut mass = DVector::<f64>::zeros(n);
        if space.barrier_down(0) <= 0.0 && 0.0 <= space.barrier_up(0) {
            mass[space.zero_index()] = 1.0;
        }

        let mut up_crossing = vec![0.0; max_time + 1];
        let mut down_crossing = vec![0.0; max_time + 1];
        let mut conservation_error = vec![0.0; max_time + 1];
        let mut masses = Vec::with_capacity(if keep_masses { max_time + 1 } else { 0 });
        if keep_masses {
            masses.push(mass.clone());
        }

        // rebuilt only when the mean increment or the barrier moves
        let mut step = Transition::empty(n);
        let mut step_key: Option<(u64, u64)> = None;
        let mut breaches = 0usize;
        let mut worst = (0usize, 0.0f64);

        for time in 1..=max_time {
            let mean = drift.mean(time - 1);
            let key = (mean.to_bits(), space.barrier_up(time).to_bits());
            if step_key != Some(key) {
                step = Transition::build(self.config.kernel, &space, time, mean, params.sigma)?;
                step_key = Some(key);
            }

            let mut next = &step.matrix * &mass;
            let mut up = step.up.dot(&mass);
            let mut down = step.down.dot(&mass);

            let sum_in = mass.sum();
            let sum_current = next.sum() + up + down;
            let error = (sum_current - sum_in).abs();
            conservation_error[time] = error;
            if error > self.config.conservation_tolerance {
                breaches += 1;
                if error > worst.1 {
                    worst = (time, error);
                }
            }

            if sum_current > 0.0 && sum_current.is_finite() {
                let scale = sum_in / sum_current;
                next *= scale;
                up *= scale;
                down *= scale;
            } else {
                if sum_in > 0.0 {
                    warn!(time, sum_in, "probability mass vanished during propagation");
                }
                next.fill(0.0);
                up = 0.0;
                down = 0.0;
            }

            mass = next;
            up_crossing[time] = up;
            down_crossing[time] = down;
            if keep_masses {
                masses.push(mass.clone());
            }
        }

        if breaches > 0 {
            warn!(
                breaches,
                worst_time = worst.0,
                worst_error = worst.1,
                tolerance = self.config.conservation_tolerance,
                "mass conservation outside tolerance before renormalization"
            );
        }

        let raw = if trial.choice.is_upper() {
            up_crossing[max_time]
        } else {
            down_crossing[max_time]
        };
        let likelihood = if raw > 0.0 { raw } else { 0.0 };
        trace!(%params, rt = trial.rt, likelihood, "trial likelihood");

        Ok(LikelihoodTrace {
            masses,
            up_crossing,
            down_crossing,
            conservation_error,
            likelihood,
        })
    }
}
