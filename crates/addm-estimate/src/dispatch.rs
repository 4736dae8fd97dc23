use addm_core::{DdmError, LikelihoodEngine, ModelParameters, Result, Trial};
use rayon::prelude::*;
use rayon::ThreadPool;

/// Runs likelihood work items on rayon, optionally on a dedicated pool.
#[derive(Default)]
pub struct Dispatcher {
    pool: Option<ThreadPool>,
}

impl Dispatcher {
    /// `None` uses rayon's global pool.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let pool = match threads {
            Some(0) => {
                return Err(DdmError::InvalidParameter("worker pool needs at least one thread".into()));
            }
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| DdmError::InvalidParameter(format!("worker pool: {e}")))?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Likelihood of one trial under every model, in model order.
    pub fn evaluate_trial(
        &self,
        engine: &LikelihoodEngine,
        models: &[ModelParameters],
        trial: &Trial,
        trial_index: usize,
    ) -> Result<Vec<f64>> {
        self.install(|| evaluate_row(engine, models, trial, trial_index))
    }

    /// Likelihood rows for a run of trials. Every (trial, model) pair is an
    /// independent work item; rows come back in trial order.
    pub fn evaluate_trials(
        &self,
        engine: &LikelihoodEngine,
        models: &[ModelParameters],
        trials: &[Trial],
        first_index: usize,
    ) -> Vec<Result<Vec<f64>>> {
        self.install(|| {
            trials
                .par_iter()
                .enumerate()
                .map(|(i, trial)| evaluate_row(engine, models, trial, first_index + i))
                .collect()
        })
    }
}

/// Collects every model's result before deciding, so a failure is reported
/// once for the whole row and never mixed with partial likelihoods.
fn evaluate_row(
    engine: &LikelihoodEngine,
    models: &[ModelParameters],
    trial: &Trial,
    trial_index: usize,
) -> Result<Vec<f64>> {
    let results: Vec<Result<f64>> = models
        .par_iter()
        .map(|model| engine.likelihood(model, trial))
        .collect();

    let total = results.len();
    let mut likelihoods = Vec::with_capacity(total);
    let mut failed = 0;
    let mut first = None;
    for result in results {
        match result {
            Ok(l) => likelihoods.push(l),
            Err(e) => {
                failed += 1;
                if first.is_none() {
                    first = Some(e);
                }
            }
        }
    }

    match first {
        Some(first) => Err(DdmError::LikelihoodBatch {
            trial_index,
            failed,
            total,
            first: Box::new(first),
        }),
        None => Ok(likelihoods),
    }
}
