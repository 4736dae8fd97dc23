//! Fixation-driven aDDM simulation.
//!
//! Attention follows a sampled sequence: an initial latency, then fixations
//! alternating between the two items with transitions in between. Durations
//! are drawn uniformly from empirical samples collected elsewhere.

use crate::simulator::{SimulatedTrial, SimulationConfig, TrialSimulator, Walk};
use addm_core::{
    attentional_mean, Choice, DdmError, Fixation, FixationItem, ModelParameters, NoiseGenerator, Result, Trial,
};
use serde::{Deserialize, Serialize};

/// Empirical fixation statistics driving the attentional simulator.
/// Durations are in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalDistributions {
    pub prob_left_fix_first: f64,
    pub latencies: Vec<u32>,
    pub transitions: Vec<u32>,
    pub fixations: Vec<u32>,
}

impl EmpiricalDistributions {
    pub fn validate(&self, time_step_ms: u32) -> Result<()> {
        if !(0.0..=1.0).contains(&self.prob_left_fix_first) {
            return Err(DdmError::InvalidParameter(format!(
                "probability of fixating left first must be in [0, 1], got {}",
                self.prob_left_fix_first
            )));
        }
        for (name, samples) in [
            ("latency", &self.latencies),
            ("transition", &self.transitions),
            ("fixation", &self.fixations),
        ] {
            if samples.is_empty() {
                return Err(DdmError::InvalidParameter(format!("no {name} samples")));
            }
        }
        // every fixation has to move the clock or the walk could stall
        if let Some(short) = self.fixations.iter().find(|d| **d < time_step_ms) {
            return Err(DdmError::InvalidParameter(format!(
                "fixation duration {short}ms is shorter than one {time_step_ms}ms time step"
            )));
        }
        Ok(())
    }
}

pub struct AddmSimulator {
    params: ModelParameters,
    theta: f64,
    distributions: EmpiricalDistributions,
    config: SimulationConfig,
}

impl AddmSimulator {
    pub fn new(
        params: ModelParameters,
        distributions: EmpiricalDistributions,
        config: SimulationConfig,
    ) -> Result<Self> {
        params.validate()?;
        config.validate()?;
        let theta = params
            .theta
            .ok_or_else(|| DdmError::InvalidParameter("aDDM simulation needs theta".into()))?;
        distributions.validate(config.time_step_ms)?;
        Ok(Self {
            params,
            theta,
            distributions,
            config,
        })
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    fn draw(&self, samples: &[u32], rng: &mut NoiseGenerator) -> u32 {
        // samples are validated non-empty
        rng.pick(samples).copied().unwrap_or(0)
    }
}

/// Fixation events and the evidence at the end of each.
struct Recorder {
    fixations: Vec<Fixation>,
    rdv: Vec<f64>,
}

impl Recorder {
    /// Runs one event of `duration_ms` at the given drift. Returns the choice
    /// if a barrier was reached, recording only the elapsed part of the event.
    fn run(
        &mut self,
        walk: &mut Walk<'_>,
        item: FixationItem,
        duration_ms: u32,
        mean: f64,
        rng: &mut NoiseGenerator,
    ) -> Result<Option<Choice>> {
        let steps = (duration_ms / walk.time_step_ms()) as usize;
        let mut taken = 0;
        let mut choice = None;
        while taken < steps {
            walk.advance(mean, rng)?;
            taken += 1;
            if let Some(c) = walk.absorbed() {
                choice = Some(c);
                break;
            }
        }
        if taken > 0 {
            self.fixations.push(Fixation::new(item, walk.elapsed_ms(taken)));
            self.rdv.push(walk.rdv);
        }
        Ok(choice)
    }
}

impl TrialSimulator for AddmSimulator {
    fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn simulate_trial(&self, value_left: f64, value_right: f64, rng: &mut NoiseGenerator) -> Result<SimulatedTrial> {
        let dists = &self.distributions;
        let mut walk = Walk::new(&self.params, &self.config);
        let mut recorder = Recorder {
            fixations: Vec::new(),
            rdv: Vec::new(),
        };

        let latency = self.draw(&dists.latencies, rng);
        let choice = match recorder.run(&mut walk, FixationItem::Latency, latency, 0.0, rng)? {
            Some(choice) => choice,
            None => {
                let mut item = if rng.uniform() < dists.prob_left_fix_first {
                    FixationItem::Left
                } else {
                    FixationItem::Right
                };
                loop {
                    let duration = self.draw(&dists.fixations, rng);
                    let mean = attentional_mean(self.params.d, self.theta, value_left, value_right, item);
                    if let Some(choice) = recorder.run(&mut walk, item, duration, mean, rng)? {
                        break choice;
                    }
                    let transition = self.draw(&dists.transitions, rng);
                    if let Some(choice) = recorder.run(&mut walk, FixationItem::Transition, transition, 0.0, rng)? {
                        break choice;
                    }
                    item = item.other();
                }
            }
        };

        let trial = Trial::new(walk.rt(), choice, value_left, value_right).with_fixations(recorder.fixations);
        Ok(SimulatedTrial {
            trial,
            fixation_rdv: recorder.rdv,
            final_rdv: walk.rdv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distributions() -> EmpiricalDistributions {
        EmpiricalDistributions {
            prob_left_fix_first: 0.7,
            latencies: vec![150, 200, 230],
            transitions: vec![20, 40, 60],
            fixations: vec![180, 250, 400, 600],
        }
    }

    fn simulator() -> AddmSimulator {
        AddmSimulator::new(
            ModelParameters::addm(0.006, 0.5, 0.08),
            distributions(),
            SimulationConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_fixations_cover_reaction_time() {
        let sim = simulator();
        let mut rng = NoiseGenerator::new(11);
        for _ in 0..200 {
            let out = sim.simulate_trial(3.0, 1.0, &mut rng).unwrap();
            let covered: u32 = out.trial.fixations.iter().map(|f| f.duration).sum();
            assert_eq!(covered, out.trial.rt);
            assert_eq!(out.fixation_rdv.len(), out.trial.fixations.len());
            assert_eq!(out.fixation_rdv.last().copied(), Some(out.final_rdv));
        }
    }

    #[test]
    fn test_sequence_alternates() {
        let sim = simulator();
        let mut rng = NoiseGenerator::new(5);
        let out = sim.simulate_trial(1.0, 1.0, &mut rng).unwrap();
        let fixations = &out.trial.fixations;
        assert_eq!(fixations[0].item, FixationItem::Latency);
        let items: Vec<FixationItem> = fixations
            .iter()
            .map(|f| f.item)
            .filter(|i| matches!(i, FixationItem::Left | FixationItem::Right))
            .collect();
        for pair in items.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_requires_theta() {
        let result = AddmSimulator::new(
            ModelParameters::ddm(0.006, 0.08),
            distributions(),
            SimulationConfig::default(),
        );
        assert!(matches!(result, Err(DdmError::InvalidParameter(_))));
    }

    #[test]
    fn test_rejects_bad_distributions() {
        let mut dists = distributions();
        dists.prob_left_fix_first = 1.5;
        assert!(dists.validate(10).is_err());
        let mut dists = distributions();
        dists.fixations = vec![5];
        assert!(dists.validate(10).is_err());
        let mut dists = distributions();
        dists.latencies.clear();
        assert!(dists.validate(10).is_err());
    }
}
