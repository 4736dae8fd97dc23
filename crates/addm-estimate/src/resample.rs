use crate::posterior::ModelPosterior;
use addm_core::{DdmError, ModelParameters, NoiseGenerator, Result};
use addm_sampler::{SimulatedTrial, TrialSimulator};
use tracing::debug;

/// Simulates from models drawn out of the posterior instead of from a single
/// point estimate.
///
/// Draws `num_samples` models with probability equal to their posterior mass;
/// each drawn model simulates `simulations_per_sample` trials per condition.
pub fn simulate_from_posterior<S, F>(
    posterior: &ModelPosterior,
    conditions: &[(f64, f64)],
    num_samples: usize,
    simulations_per_sample: usize,
    seed: u64,
    make_simulator: F,
) -> Result<Vec<SimulatedTrial>>
where
    S: TrialSimulator,
    F: Fn(&ModelParameters) -> Result<S>,
{
    let mut rng = NoiseGenerator::new(seed);
    let mut trials = Vec::with_capacity(num_samples * conditions.len() * simulations_per_sample);

    for sample in 0..num_samples {
        let index = rng
            .weighted_index(posterior.probabilities())
            .ok_or_else(|| DdmError::InvalidParameter("posterior carries no mass".into()))?;
        let model = posterior.models()[index];
        debug!(sample, %model, "simulating sampled model");

        let simulator = make_simulator(&model)?;
        let sample_seed = seed.wrapping_add((sample as u64 + 1).wrapping_mul(0xd1b54a32d192ed03));
        trials.extend(simulator.simulate_conditions(conditions, simulations_per_sample, sample_seed)?);
    }
    Ok(trials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ModelGrid;
    use crate::posterior::PosteriorEstimator;
    use crate::Dispatcher;
    use addm_core::{EngineConfig, LikelihoodEngine};
    use addm_sampler::{DdmSimulator, SimulationConfig};

    #[test]
    fn test_only_supported_models_drawn() {
        let grid = ModelGrid::ddm(&[0.003, 0.009], &[0.08]).unwrap();
        let mut est = PosteriorEstimator::new(&grid, LikelihoodEngine::new(EngineConfig::default()), Dispatcher::default());
        est.observe_likelihoods(&[0.0, 1.0]).unwrap();

        let drawn = std::sync::Mutex::new(Vec::new());
        let trials = simulate_from_posterior(est.posterior(), &[(1.0, 0.0), (0.0, 1.0)], 8, 3, 5, |m| {
            drawn.lock().unwrap().push(*m);
            DdmSimulator::new(*m, SimulationConfig::default())
        })
        .unwrap();

        assert_eq!(trials.len(), 8 * 2 * 3);
        assert!(drawn.lock().unwrap().iter().all(|m| *m == ModelParameters::ddm(0.009, 0.08)));
    }
}
