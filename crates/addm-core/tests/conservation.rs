use addm_core::{Choice, EngineConfig, Fixation, FixationItem, LikelihoodEngine, ModelParameters, Trial};

fn assert_conserved(params: &ModelParameters, trial: &Trial) {
    let engine = LikelihoodEngine::new(EngineConfig::default());
    let trace = engine.trace(params, trial).unwrap();

    let mut worst: f64 = 0.0;
    for t in 0..trace.masses.len() {
        let total = trace.total_mass(t).unwrap();
        worst = worst.max((total - 1.0).abs());
        assert!(
            (total - 1.0).abs() < 1e-6,
            "mass {} at step {} for {}",
            total,
            t,
            params
        );
        assert!(trace.masses[t].iter().all(|p| *p >= 0.0));
    }
    println!(
        "{}: worst conservation error {:.2e} (before renormalization {:.2e})",
        params,
        worst,
        trace.worst_conservation_error()
    );
    assert!(trace.worst_conservation_error() < engine.config().conservation_tolerance);
}

#[test]
fn mass_conserved_constant_barriers() {
    for (d, sigma) in [(0.006, 0.08), (0.0, 0.05), (0.02, 0.2)] {
        let params = ModelParameters::ddm(d, sigma);
        assert_conserved(&params, &Trial::new(3000, Choice::Left, 2.0, 0.0));
    }
}

#[test]
fn mass_conserved_decaying_barriers() {
    let params = ModelParameters::ddm(0.006, 0.08).with_decay(0.005);
    assert_conserved(&params, &Trial::new(2000, Choice::Right, 1.0, 2.0));
}

#[test]
fn mass_conserved_attentional() {
    let params = ModelParameters::addm(0.006, 0.5, 0.08);
    let trial = Trial::new(1500, Choice::Left, 3.0, 1.0).with_fixations(vec![
        Fixation::new(FixationItem::Latency, 180),
        Fixation::new(FixationItem::Left, 420),
        Fixation::new(FixationItem::Transition, 40),
        Fixation::new(FixationItem::Right, 600),
        Fixation::new(FixationItem::Transition, 30),
        Fixation::new(FixationItem::Left, 230),
    ]);
    assert_conserved(&params, &trial);
}

#[test]
fn absorbed_mass_sums_to_at_most_one() {
    let engine = LikelihoodEngine::new(EngineConfig::default());
    let params = ModelParameters::ddm(0.006, 0.08);
    let trace = engine.trace(&params, &Trial::new(20_000, Choice::Left, 0.0, 0.0)).unwrap();
    let absorbed: f64 = trace.up_crossing.iter().sum::<f64>() + trace.down_crossing.iter().sum::<f64>();
    // two minutes of diffusion absorbs essentially everything
    assert!(absorbed > 0.99 && absorbed <= 1.0 + 1e-9, "absorbed {}", absorbed);
}
