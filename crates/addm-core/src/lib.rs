pub mod config;
pub mod drift;
pub mod error;
pub mod likelihood;
pub mod noise;
pub mod params;
pub mod state_space;
pub mod trial;

pub use config::{EngineConfig, TransitionKernel};
pub use drift::{attentional_mean, ConstantDrift, FixationDrift, MeanIncrement, TrialDrift};
pub use error::{DdmError, Result};
pub use likelihood::{LikelihoodEngine, LikelihoodTrace};
pub use noise::NoiseGenerator;
pub use params::ModelParameters;
pub use state_space::StateSpace;
pub use trial::{Choice, Dataset, Fixation, FixationItem, Trial};
