//! Continuous maximum-likelihood search over a bounded parameter box.
//!
//! [`NllObjective`] carries everything one evaluation needs: the dataset, the
//! engine, the bounds and the subsampling plan. Each evaluation draws a fresh
//! per-subject subsample from its own seeded stream, so a run is
//! reproducible from the seed alone.
//!
//! [`minimize`] is a basin-hopping search. Every hop displaces the current
//! point at random, refines it with a Nelder-Mead solve and keeps it under a
//! Metropolis rule. The best local minimum seen is what gets reported.

use addm_core::{Dataset, DdmError, LikelihoodEngine, ModelParameters, NoiseGenerator, Result, Trial};
use argmin::core::{CostFunction, Executor, State};
use argmin::solver::neldermead::NelderMead;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Vector layout `[d, sigma]`.
    Ddm,
    /// Vector layout `[d, theta, sigma]`.
    Addm,
}

impl Variant {
    pub fn dim(self) -> usize {
        match self {
            Variant::Ddm => 2,
            Variant::Addm => 3,
        }
    }
}

/// Box constraints and fixed settings for the searched parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub variant: Variant,
    pub bounds: Vec<Bound>,
    pub barrier: f64,
    pub decay: f64,
}

impl ParameterSpace {
    pub fn new(variant: Variant, bounds: Vec<Bound>) -> Result<Self> {
        if bounds.len() != variant.dim() {
            return Err(DdmError::InvalidParameter(format!(
                "{:?} needs {} bounds, got {}",
                variant,
                variant.dim(),
                bounds.len()
            )));
        }
        if let Some(bad) = bounds.iter().find(|b| !(b.lower <= b.upper && b.lower.is_finite() && b.upper.is_finite())) {
            return Err(DdmError::InvalidParameter(format!(
                "bound [{}, {}] is empty or not finite",
                bad.lower, bad.upper
            )));
        }
        Ok(Self {
            variant,
            bounds,
            barrier: addm_core::params::DEFAULT_BARRIER,
            decay: 0.0,
        })
    }

    /// Search box used for pooled aDDM fits.
    pub fn addm_default() -> Self {
        Self {
            variant: Variant::Addm,
            bounds: vec![Bound::new(0.00005, 0.01), Bound::new(0.0, 1.0), Bound::new(0.05, 0.1)],
            barrier: addm_core::params::DEFAULT_BARRIER,
            decay: 0.0,
        }
    }

    pub fn ddm_default() -> Self {
        Self {
            variant: Variant::Ddm,
            bounds: vec![Bound::new(0.00005, 0.01), Bound::new(0.05, 0.1)],
            barrier: addm_core::params::DEFAULT_BARRIER,
            decay: 0.0,
        }
    }

    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter().zip(&self.bounds).map(|(v, b)| b.clamp(*v)).collect()
    }

    /// Parameters for a search vector, projected into the box first.
    pub fn to_params(&self, x: &[f64]) -> Result<ModelParameters> {
        if x.len() != self.variant.dim() {
            return Err(DdmError::InvalidParameter(format!(
                "expected {} parameters, got {}",
                self.variant.dim(),
                x.len()
            )));
        }
        let x = self.clamp(x);
        let params = match self.variant {
            Variant::Ddm => ModelParameters::ddm(x[0], x[1]),
            Variant::Addm => ModelParameters::addm(x[0], x[1], x[2]),
        };
        Ok(params.with_barrier(self.barrier).with_decay(self.decay))
    }
}

/// Negative log-likelihood of a dataset as an optimizer cost.
pub struct NllObjective<'a> {
    engine: &'a LikelihoodEngine,
    dataset: &'a Dataset,
    space: ParameterSpace,
    /// Trials drawn per subject per evaluation; 0 uses every trial.
    trials_per_subject: usize,
    seed: u64,
    evaluations: AtomicU64,
}

impl<'a> NllObjective<'a> {
    pub fn new(
        engine: &'a LikelihoodEngine,
        dataset: &'a Dataset,
        space: ParameterSpace,
        trials_per_subject: usize,
        seed: u64,
    ) -> Result<Self> {
        if dataset.is_empty() {
            return Err(DdmError::InvalidParameter("dataset has no trials".into()));
        }
        Ok(Self {
            engine,
            dataset,
            space,
            trials_per_subject,
            seed,
            evaluations: AtomicU64::new(0),
        })
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    fn subsample(&self, evaluation: u64) -> Vec<&'a Trial> {
        let mut rng = NoiseGenerator::from_stream_id(self.seed, evaluation);
        let mut picked = Vec::new();
        for trials in self.dataset.subjects.values() {
            if self.trials_per_subject == 0 {
                picked.extend(trials.iter());
            } else {
                picked.extend(
                    rng.sample_indices(trials.len(), self.trials_per_subject)
                        .into_iter()
                        .map(|i| &trials[i]),
                );
            }
        }
        picked
    }

    /// Sum of `-ln L` over this evaluation's subsample. Trials with zero
    /// likelihood contribute nothing.
    pub fn negative_log_likelihood(&self, params: &ModelParameters) -> Result<f64> {
        let evaluation = self.evaluations.fetch_add(1, Ordering::Relaxed);
        let trials = self.subsample(evaluation);
        let likelihoods: Vec<f64> = trials
            .par_iter()
            .map(|trial| self.engine.likelihood(params, trial))
            .collect::<Result<_>>()?;
        let nll = -likelihoods
            .iter()
            .filter(|l| **l > 0.0)
            .map(|l| l.ln())
            .sum::<f64>();
        debug!(evaluation, %params, nll, "objective evaluated");
        Ok(nll)
    }
}

impl CostFunction for NllObjective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let params = self.space.to_params(x)?;
        Ok(self.negative_log_likelihood(&params)?)
    }
}

/// Borrowed objective, so one objective can back many local solves.
struct LocalCost<'o, 'a>(&'o NllObjective<'a>);

impl CostFunction for LocalCost<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.0.cost(x)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Iteration cap for each Nelder-Mead solve.
    pub max_iters: u64,
    /// Initial simplex edge as a fraction of each bound's width.
    pub initial_step: f64,
    pub sd_tolerance: f64,
    /// Basin-hopping rounds after the first local solve; 0 runs a single
    /// local search.
    pub num_iterations: u64,
    /// Half-width of the uniform displacement added to every coordinate
    /// before a hop.
    pub step_size: f64,
    /// Metropolis temperature, in NLL units.
    pub temperature: f64,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            initial_step: 0.1,
            sd_tolerance: 1e-6,
            num_iterations: 100,
            step_size: 0.001,
            temperature: 1.0,
        }
    }
}

impl OptimizerOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_step > 0.0 && self.initial_step.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "initial simplex step must be positive, got {}",
                self.initial_step
            )));
        }
        if !(self.step_size >= 0.0 && self.step_size.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "hop step size must be non-negative, got {}",
                self.step_size
            )));
        }
        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationOutcome {
    pub params: ModelParameters,
    pub nll: f64,
    /// Nelder-Mead iterations summed over every local solve.
    pub iterations: u64,
    pub evaluations: u64,
    /// Hops whose local minimum replaced the current point.
    pub accepted: u64,
    /// Best NLL after the first local solve and after each hop.
    pub best_history: Vec<f64>,
}

struct LocalMinimum {
    x: Vec<f64>,
    nll: f64,
    iterations: u64,
}

/// Stream reserved for hop displacements, apart from the subsample streams.
const HOP_STREAM: u64 = u64::MAX;

fn local_solve(objective: &NllObjective<'_>, x0: &[f64], options: &OptimizerOptions) -> Result<LocalMinimum> {
    let space = objective.space();
    let x0 = space.clamp(x0);

    let mut simplex = vec![x0.clone()];
    for (i, bound) in space.bounds.iter().enumerate() {
        let mut vertex = x0.clone();
        let step = options.initial_step * bound.width();
        vertex[i] = if vertex[i] + step <= bound.upper {
            vertex[i] + step
        } else {
            vertex[i] - step
        };
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(options.sd_tolerance)
        .map_err(|e| DdmError::Optimizer(e.to_string()))?;
    let result = Executor::new(LocalCost(objective), solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(|e| DdmError::Optimizer(e.to_string()))?;

    let state = result.state();
    let best = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| DdmError::Optimizer("no parameters evaluated".into()))?;
    Ok(LocalMinimum {
        x: space.clamp(&best),
        nll: state.get_best_cost(),
        iterations: state.get_iter(),
    })
}

/// Basin-hopping minimization of the objective, starting from `initial`.
pub fn minimize(objective: &NllObjective<'_>, initial: &[f64], options: &OptimizerOptions) -> Result<OptimizationOutcome> {
    options.validate()?;
    let space = objective.space().clone();
    if initial.len() != space.variant.dim() {
        return Err(DdmError::InvalidParameter(format!(
            "initial guess needs {} values, got {}",
            space.variant.dim(),
            initial.len()
        )));
    }
    let evaluations_before = objective.evaluations();

    info!(
        start = ?space.clamp(initial),
        hops = options.num_iterations,
        max_iters = options.max_iters,
        "starting basin hopping"
    );
    let mut current = local_solve(objective, initial, options)?;
    let mut iterations = current.iterations;
    let mut best = (current.x.clone(), current.nll);
    let mut best_history = vec![best.1];
    let mut accepted = 0;

    let mut rng = NoiseGenerator::from_stream_id(objective.seed, HOP_STREAM);
    for hop in 1..=options.num_iterations {
        let displaced: Vec<f64> = current
            .x
            .iter()
            .map(|x| x + options.step_size * (2.0 * rng.uniform() - 1.0))
            .collect();
        let candidate = local_solve(objective, &displaced, options)?;
        iterations += candidate.iterations;

        // always downhill, uphill with probability exp(-delta / T)
        let delta = candidate.nll - current.nll;
        let accept = delta <= 0.0 || rng.uniform() < (-delta / options.temperature).exp();
        if candidate.nll < best.1 {
            best = (candidate.x.clone(), candidate.nll);
        }
        debug!(hop, nll = candidate.nll, accept, best = best.1, "basin hop");
        if accept {
            accepted += 1;
            current = candidate;
        }
        best_history.push(best.1);
    }

    let outcome = OptimizationOutcome {
        params: space.to_params(&best.0)?,
        nll: best.1,
        iterations,
        evaluations: objective.evaluations() - evaluations_before,
        accepted,
        best_history,
    };
    info!(
        params = %outcome.params,
        nll = outcome.nll,
        accepted,
        evaluations = outcome.evaluations,
        "basin hopping finished"
    );
    Ok(outcome)
}
