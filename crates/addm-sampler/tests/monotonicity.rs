use addm_core::ModelParameters;
use addm_sampler::{summarize, DdmSimulator, SimulationConfig, TrialSimulator};
use approx::assert_abs_diff_eq;

#[test]
fn higher_barrier_means_slower_responses() {
    let conditions = [(1.0, 0.0), (1.0, 2.0)];
    let mut mean_rts = Vec::new();

    for barrier in [0.6, 1.0, 1.5] {
        let params = ModelParameters::ddm(0.006, 0.08).with_barrier(barrier);
        let sim = DdmSimulator::new(params, SimulationConfig::default()).unwrap();
        let trials = sim.simulate_conditions(&conditions, 1000, 17).unwrap();
        let stats = summarize(&trials);
        println!("barrier {:.1}: mean RT {:.1}ms (sd {:.1})", barrier, stats.mean_rt, stats.rt_std);
        mean_rts.push(stats.mean_rt);
    }

    for pair in mean_rts.windows(2) {
        assert!(pair[1] > pair[0], "mean RTs not increasing: {:?}", mean_rts);
    }
}

#[test]
fn drift_sets_choice_proportions() {
    let params = ModelParameters::ddm(0.006, 0.08);
    let sim = DdmSimulator::new(params, SimulationConfig::default()).unwrap();

    let favored_left = summarize(&sim.simulate_conditions(&[(3.0, 0.0)], 1000, 3).unwrap());
    let balanced = summarize(&sim.simulate_conditions(&[(1.0, 1.0)], 1000, 3).unwrap());

    assert!(favored_left.left_fraction > 0.8, "left fraction {}", favored_left.left_fraction);
    assert_abs_diff_eq!(balanced.left_fraction, 0.5, epsilon = 0.06);
}
