pub mod fixations;
pub mod simulator;

pub use fixations::{AddmSimulator, EmpiricalDistributions};
pub use simulator::{
    summarize, DdmSimulator, SimulatedTrial, SimulationConfig, SimulationStats, TrialSimulator,
};
