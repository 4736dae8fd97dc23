//! Sequential Bayesian updating over a fixed model grid.
//!
//! Likelihoods for different trials are independent of the posterior, so they
//! may be computed in any order and in parallel. Folding them into the
//! posterior is strictly sequential in trial order.

use crate::dispatch::Dispatcher;
use crate::grid::ModelGrid;
use addm_core::{DdmError, LikelihoodEngine, ModelParameters, Result, Trial};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Probability of each candidate model, aligned with the grid order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelPosterior {
    models: Vec<ModelParameters>,
    probabilities: Vec<f64>,
    #[serde(skip)]
    index: HashMap<ModelParameters, usize>,
}

impl ModelPosterior {
    pub fn uniform(grid: &ModelGrid) -> Self {
        let models = grid.models().to_vec();
        let p = 1.0 / models.len() as f64;
        let index = models.iter().enumerate().map(|(i, m)| (*m, i)).collect();
        Self {
            probabilities: vec![p; models.len()],
            models,
            index,
        }
    }

    pub fn get(&self, model: &ModelParameters) -> Option<f64> {
        self.index.get(model).map(|&i| self.probabilities[i])
    }

    pub fn models(&self) -> &[ModelParameters] {
        &self.models
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModelParameters, f64)> {
        self.models.iter().zip(self.probabilities.iter().copied())
    }

    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// Most probable model; the first one wins ties.
    pub fn map_estimate(&self) -> (ModelParameters, f64) {
        let mut best = 0;
        for (i, p) in self.probabilities.iter().enumerate() {
            if *p > self.probabilities[best] {
                best = i;
            }
        }
        (self.models[best], self.probabilities[best])
    }

    pub fn to_map(&self) -> HashMap<ModelParameters, f64> {
        self.iter().map(|(m, p)| (*m, p)).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// Every model gave the trial zero likelihood; the posterior is unchanged.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserveSummary {
    pub updated: usize,
    pub skipped: usize,
}

pub struct PosteriorEstimator {
    engine: LikelihoodEngine,
    dispatcher: Dispatcher,
    posterior: ModelPosterior,
    observed: usize,
    skipped: usize,
}

impl PosteriorEstimator {
    pub fn new(grid: &ModelGrid, engine: LikelihoodEngine, dispatcher: Dispatcher) -> Self {
        Self {
            engine,
            dispatcher,
            posterior: ModelPosterior::uniform(grid),
            observed: 0,
            skipped: 0,
        }
    }

    pub fn posterior(&self) -> &ModelPosterior {
        &self.posterior
    }

    pub fn engine(&self) -> &LikelihoodEngine {
        &self.engine
    }

    /// Trials folded in so far, skipped ones included.
    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Evaluates the trial under every model and folds it in.
    pub fn observe(&mut self, trial: &Trial) -> Result<UpdateOutcome> {
        let likelihoods = self.dispatcher.evaluate_trial(
            &self.engine,
            self.posterior.models(),
            trial,
            self.observed,
        )?;
        self.observe_likelihoods(&likelihoods)
    }

    /// Folds in one trial given its likelihood under each model, in grid order.
    pub fn observe_likelihoods(&mut self, likelihoods: &[f64]) -> Result<UpdateOutcome> {
        let priors = &mut self.posterior.probabilities;
        if likelihoods.len() != priors.len() {
            return Err(DdmError::InvalidParameter(format!(
                "expected {} likelihoods, got {}",
                priors.len(),
                likelihoods.len()
            )));
        }
        if let Some(bad) = likelihoods.iter().find(|l| !(l.is_finite() && **l >= 0.0)) {
            return Err(DdmError::InvalidParameter(format!("likelihood {bad} is not a probability")));
        }

        let trial_index = self.observed;
        self.observed += 1;

        let denominator: f64 = priors.iter().zip(likelihoods).map(|(p, l)| p * l).sum();
        if denominator == 0.0 {
            self.skipped += 1;
            debug!(trial_index, "no model explains trial, posterior unchanged");
            return Ok(UpdateOutcome::Skipped);
        }

        for (p, l) in priors.iter_mut().zip(likelihoods) {
            *p = *p * l / denominator;
        }
        debug!(trial_index, denominator, "posterior updated");
        Ok(UpdateOutcome::Updated)
    }

    /// Observes a run of trials in order.
    ///
    /// Likelihood rows are computed up front in parallel; the posterior is
    /// then updated one trial at a time. On a failed row, every earlier trial
    /// stays applied and the error is returned.
    pub fn observe_all(&mut self, trials: &[Trial]) -> Result<ObserveSummary> {
        info!(
            trials = trials.len(),
            models = self.posterior.models().len(),
            threads = self.dispatcher.threads(),
            "computing likelihoods"
        );
        let rows = self.dispatcher.evaluate_trials(
            &self.engine,
            self.posterior.models(),
            trials,
            self.observed,
        );

        let mut summary = ObserveSummary::default();
        for row in rows {
            match self.observe_likelihoods(&row?)? {
                UpdateOutcome::Updated => summary.updated += 1,
                UpdateOutcome::Skipped => summary.skipped += 1,
            }
        }
        if summary.skipped > 0 {
            warn!(skipped = summary.skipped, "trials with zero likelihood under every model");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use addm_core::{Choice, EngineConfig};
    use approx::assert_relative_eq;

    fn estimator() -> PosteriorEstimator {
        let grid = ModelGrid::ddm(&[0.005, 0.006], &[0.08]).unwrap();
        PosteriorEstimator::new(&grid, LikelihoodEngine::new(EngineConfig::default()), Dispatcher::default())
    }

    #[test]
    fn test_starts_uniform() {
        let est = estimator();
        assert_eq!(est.posterior().probabilities(), &[0.5, 0.5]);
        assert_eq!(est.posterior().get(&ModelParameters::ddm(0.006, 0.08)), Some(0.5));
    }

    #[test]
    fn test_bayes_update() {
        let mut est = estimator();
        assert_eq!(est.observe_likelihoods(&[0.1, 0.3]).unwrap(), UpdateOutcome::Updated);
        assert_relative_eq!(est.posterior().probabilities()[0], 0.25);
        assert_relative_eq!(est.posterior().probabilities()[1], 0.75);
        est.observe_likelihoods(&[0.3, 0.1]).unwrap();
        assert_relative_eq!(est.posterior().probabilities()[0], 0.5);
    }

    #[test]
    fn test_zero_denominator_is_noop() {
        let mut est = estimator();
        est.observe_likelihoods(&[0.2, 0.6]).unwrap();
        let before = est.posterior().clone();
        assert_eq!(est.observe_likelihoods(&[0.0, 0.0]).unwrap(), UpdateOutcome::Skipped);
        assert_eq!(est.posterior(), &before);
        assert_eq!(est.skipped(), 1);
        assert_eq!(est.observed(), 2);
    }

    #[test]
    fn test_rejects_mismatched_row() {
        let mut est = estimator();
        assert!(est.observe_likelihoods(&[0.2]).is_err());
        assert!(est.observe_likelihoods(&[0.2, f64::NAN]).is_err());
        assert_eq!(est.observed(), 0);
    }

    #[test]
    fn test_observe_trial_normalized() {
        let mut est = estimator();
        est.observe(&Trial::new(900, Choice::Left, 2.0, 0.0)).unwrap();
        assert_relative_eq!(est.posterior().sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_trial_aborts_update() {
        let mut est = estimator();
        let trials = [
            Trial::new(900, Choice::Left, 2.0, 0.0),
            Trial::new(0, Choice::Left, 2.0, 0.0),
            Trial::new(900, Choice::Right, 2.0, 0.0),
        ];
        let err = est.observe_all(&trials).unwrap_err();
        assert!(matches!(err, DdmError::LikelihoodBatch { trial_index: 1, failed: 2, .. }));
        assert_eq!(est.observed(), 1);
    }

    #[test]
    fn test_map_estimate() {
        let mut est = estimator();
        est.observe_likelihoods(&[0.1, 0.4]).unwrap();
        let (model, p) = est.posterior().map_estimate();
        assert_eq!(model, ModelParameters::ddm(0.006, 0.08));
        assert_relative_eq!(p, 0.8);
    }
}
