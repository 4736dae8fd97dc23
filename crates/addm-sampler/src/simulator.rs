use addm_core::{Choice, ConstantDrift, DdmError, MeanIncrement, ModelParameters, NoiseGenerator, Result, Trial};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings shared by every simulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub time_step_ms: u32,
    /// Walks still inside the barriers after this many steps fail.
    pub max_steps: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step_ms: 10,
            max_steps: 100_000,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_step_ms == 0 {
            return Err(DdmError::InvalidParameter("time step must be positive".into()));
        }
        if self.max_steps == 0 {
            return Err(DdmError::InvalidParameter("max steps must be positive".into()));
        }
        Ok(())
    }
}

/// A generated trial plus the evidence recorded while producing it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrial {
    pub trial: Trial,
    /// Evidence at the end of each fixation event, aligned with `trial.fixations`.
    pub fixation_rdv: Vec<f64>,
    pub final_rdv: f64,
}

/// Generates synthetic trials by sampling the accumulation process directly.
pub trait TrialSimulator: Send + Sync {
    fn config(&self) -> &SimulationConfig;

    fn simulate_trial(&self, value_left: f64, value_right: f64, rng: &mut NoiseGenerator) -> Result<SimulatedTrial>;

    /// `trials_per_condition` trials for every (left, right) value pair, in
    /// condition-major order. Trial `k` draws from stream `k` of `seed`, so
    /// the output does not depend on the thread count.
    fn simulate_conditions(
        &self,
        conditions: &[(f64, f64)],
        trials_per_condition: usize,
        seed: u64,
    ) -> Result<Vec<SimulatedTrial>> {
        let total = conditions.len() * trials_per_condition;
        debug!(conditions = conditions.len(), total, seed, "simulating trials");
        (0..total)
            .into_par_iter()
            .map(|idx| {
                let (value_left, value_right) = conditions[idx / trials_per_condition];
                let mut rng = NoiseGenerator::from_stream_id(seed, idx as u64);
                self.simulate_trial(value_left, value_right, &mut rng)
            })
            .collect()
    }
}

/// Running evidence of one sampled walk.
pub(crate) struct Walk<'a> {
    params: &'a ModelParameters,
    config: &'a SimulationConfig,
    pub(crate) rdv: f64,
    pub(crate) steps: usize,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(params: &'a ModelParameters, config: &'a SimulationConfig) -> Self {
        Self {
            params,
            config,
            rdv: 0.0,
            steps: 0,
        }
    }

    /// Choice once the evidence sits at or beyond a barrier.
    pub(crate) fn absorbed(&self) -> Option<Choice> {
        let barrier = self.params.barrier_at(self.steps);
        if self.rdv >= barrier {
            Some(Choice::Left)
        } else if self.rdv <= -barrier {
            Some(Choice::Right)
        } else {
            None
        }
    }

    pub(crate) fn advance(&mut self, mean: f64, rng: &mut NoiseGenerator) -> Result<()> {
        if self.steps >= self.config.max_steps {
            return Err(DdmError::SimulationTimeout {
                max_steps: self.config.max_steps,
            });
        }
        self.rdv += rng.increment(mean, self.params.sigma);
        self.steps += 1;
        Ok(())
    }

    pub(crate) fn time_step_ms(&self) -> u32 {
        self.config.time_step_ms
    }

    pub(crate) fn elapsed_ms(&self, steps: usize) -> u32 {
        u32::try_from(steps)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.config.time_step_ms)
    }

    pub(crate) fn rt(&self) -> u32 {
        self.elapsed_ms(self.steps)
    }
}

/// Plain DDM: constant drift from the value difference.
#[derive(Clone, Debug)]
pub struct DdmSimulator {
    params: ModelParameters,
    config: SimulationConfig,
}

impl DdmSimulator {
    pub fn new(params: ModelParameters, config: SimulationConfig) -> Result<Self> {
        params.validate()?;
        config.validate()?;
        Ok(Self { params, config })
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }
}

impl TrialSimulator for DdmSimulator {
    fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn simulate_trial(&self, value_left: f64, value_right: f64, rng: &mut NoiseGenerator) -> Result<SimulatedTrial> {
        let drift = ConstantDrift::new(self.params.d, value_left, value_right);
        let mut walk = Walk::new(&self.params, &self.config);
        let choice = loop {
            if let Some(choice) = walk.absorbed() {
                break choice;
            }
            walk.advance(drift.mean(walk.steps), rng)?;
        };

        Ok(SimulatedTrial {
            trial: Trial::new(walk.rt(), choice, value_left, value_right),
            fixation_rdv: Vec::new(),
            final_rdv: walk.rdv,
        })
    }
}

/// Summary of a batch of simulated trials.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationStats {
    pub n_trials: usize,
    pub mean_rt: f64,
    pub rt_std: f64,
    /// Fraction of trials ending at the upper (left) barrier.
    pub left_fraction: f64,
}

pub fn summarize(trials: &[SimulatedTrial]) -> SimulationStats {
    let n = trials.len();
    if n == 0 {
        return SimulationStats {
            n_trials: 0,
            mean_rt: 0.0,
            rt_std: 0.0,
            left_fraction: 0.0,
        };
    }
    let mean_rt = trials.iter().map(|t| t.trial.rt as f64).sum::<f64>() / n as f64;
    let var = trials
        .iter()
        .map(|t| (t.trial.rt as f64 - mean_rt).powi(2))
        .sum::<f64>()
        / (n - 1).max(1) as f64;
    let left = trials.iter().filter(|t| t.trial.choice == Choice::Left).count();
    SimulationStats {
        n_trials: n,
        mean_rt,
        rt_std: var.sqrt(),
        left_fraction: left as f64 / n as f64,
    }
}
