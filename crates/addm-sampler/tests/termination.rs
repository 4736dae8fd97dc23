use addm_core::{DdmError, ModelParameters, NoiseGenerator};
use addm_sampler::{DdmSimulator, SimulationConfig, TrialSimulator};
use rayon::prelude::*;

#[test]
fn walks_reach_a_barrier_within_budget() {
    let params = ModelParameters::ddm(0.006, 0.08).with_barrier(1.0);
    let config = SimulationConfig::default().with_max_steps(10_000);
    let sim = DdmSimulator::new(params, config).unwrap();
    let n_trials = 10_000;

    let outcomes: Vec<bool> = (0..n_trials)
        .into_par_iter()
        .map(|id| {
            let mut rng = NoiseGenerator::from_stream_id(2024, id as u64);
            let (value_left, value_right) = [(0.0, 0.0), (1.0, 0.0), (0.0, 2.0)][id % 3];
            match sim.simulate_trial(value_left, value_right, &mut rng) {
                Ok(_) => true,
                Err(DdmError::SimulationTimeout { .. }) => false,
                Err(e) => panic!("unexpected error: {e}"),
            }
        })
        .collect();

    let finished = outcomes.iter().filter(|ok| **ok).count();
    let rate = finished as f64 / n_trials as f64;
    println!("Terminated: {}/{} ({:.3}%)", finished, n_trials, rate * 100.0);
    assert!(rate >= 0.999, "only {:.3}% of walks terminated", rate * 100.0);
}
