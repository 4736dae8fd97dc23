use addm_core::{Choice, EngineConfig, Fixation, FixationItem, LikelihoodEngine, ModelParameters, Trial};
use approx::assert_relative_eq;

#[test]
fn no_drift_choices_equally_likely() {
    let engine = LikelihoodEngine::new(EngineConfig::default());
    let params = ModelParameters::ddm(0.0, 0.08);

    for rt in [50, 200, 730, 1500, 5000] {
        let left = engine.likelihood(&params, &Trial::new(rt, Choice::Left, 1.0, 1.0)).unwrap();
        let right = engine.likelihood(&params, &Trial::new(rt, Choice::Right, 1.0, 1.0)).unwrap();
        assert_relative_eq!(left, right, max_relative = 1e-9);
    }
}

#[test]
fn equal_values_symmetric_for_any_d() {
    let engine = LikelihoodEngine::new(EngineConfig::default());
    let params = ModelParameters::ddm(0.007, 0.095);
    let left = engine.likelihood(&params, &Trial::new(900, Choice::Left, 2.0, 2.0)).unwrap();
    let right = engine.likelihood(&params, &Trial::new(900, Choice::Right, 2.0, 2.0)).unwrap();
    assert_relative_eq!(left, right, max_relative = 1e-9);
}

#[test]
fn mirrored_values_swap_choices() {
    let engine = LikelihoodEngine::new(EngineConfig::default());
    let params = ModelParameters::ddm(0.006, 0.08);
    let left = engine.likelihood(&params, &Trial::new(1200, Choice::Left, 3.0, 1.0)).unwrap();
    let right = engine.likelihood(&params, &Trial::new(1200, Choice::Right, 1.0, 3.0)).unwrap();
    assert_relative_eq!(left, right, max_relative = 1e-9);
}

#[test]
fn attention_shifts_likelihood_toward_fixated_item() {
    let engine = LikelihoodEngine::new(EngineConfig::default());
    let params = ModelParameters::addm(0.006, 0.3, 0.08);
    let looked_left = Trial::new(1000, Choice::Left, 2.0, 2.0)
        .with_fixations(vec![Fixation::new(FixationItem::Left, 1000)]);
    let looked_right = Trial::new(1000, Choice::Left, 2.0, 2.0)
        .with_fixations(vec![Fixation::new(FixationItem::Right, 1000)]);

    let a = engine.likelihood(&params, &looked_left).unwrap();
    let b = engine.likelihood(&params, &looked_right).unwrap();
    assert!(a > b, "left-fixated {} vs right-fixated {}", a, b);
}
