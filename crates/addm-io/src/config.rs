//! TOML run configuration for the `addm` binary.

use addm_core::{DdmError, EngineConfig, ModelParameters};
use addm_estimate::{ModelGrid, OptimizerOptions};
use addm_sampler::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] DdmError),
}

/// Candidate values for the posterior grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub d: Vec<f64>,
    pub sigma: Vec<f64>,
    /// Present for attentional grids.
    pub theta: Option<Vec<f64>>,
    pub barrier: f64,
    pub decay: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            d: vec![0.005, 0.006, 0.007],
            sigma: vec![0.065, 0.08, 0.095],
            theta: None,
            barrier: addm_core::params::DEFAULT_BARRIER,
            decay: 0.0,
        }
    }
}

impl GridConfig {
    pub fn build(&self) -> Result<ModelGrid, DdmError> {
        let grid = match &self.theta {
            Some(theta) => ModelGrid::addm(&self.d, theta, &self.sigma)?,
            None => ModelGrid::ddm(&self.d, &self.sigma)?,
        };
        grid.with_barrier(self.barrier, self.decay)
    }

    /// Applies this grid's barrier settings to a single model.
    pub fn shape(&self, params: ModelParameters) -> ModelParameters {
        params.with_barrier(self.barrier).with_decay(self.decay)
    }
}

/// Synthetic experiment layout; `None` falls back to the command's default
/// condition set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub conditions: Option<Vec<(f64, f64)>>,
    pub trials_per_condition: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Dedicated pool size; unset uses rayon's global pool.
    pub threads: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub simulation: SimulationConfig,
    pub grid: GridConfig,
    pub experiment: ExperimentConfig,
    pub optimizer: OptimizerOptions,
    pub workers: WorkersConfig,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DdmError> {
        self.engine.validate()?;
        self.simulation.validate()?;
        self.optimizer.validate()?;
        if self.engine.time_step_ms != self.simulation.time_step_ms {
            return Err(DdmError::InvalidParameter(format!(
                "engine time step {}ms differs from simulation time step {}ms",
                self.engine.time_step_ms, self.simulation.time_step_ms
            )));
        }
        if self.workers.threads == Some(0) {
            return Err(DdmError::InvalidParameter("workers.threads must be at least 1".into()));
        }
        if self.experiment.trials_per_condition == Some(0) {
            return Err(DdmError::InvalidParameter("trials_per_condition must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn example_config() -> &'static str {
    r#"# addm configuration file

[engine]
time_step_ms = 10
state_step = 0.02
conservation_tolerance = 1e-6
kernel = "cell_integrated"

[simulation]
time_step_ms = 10
max_steps = 100000
seed = 42

[grid]
d = [0.005, 0.006, 0.007]
sigma = [0.065, 0.08, 0.095]
# theta = [0.4, 0.5, 0.6]
barrier = 1.0
decay = 0.0

[experiment]
# conditions = [[0, 0], [0, 1], [0, 2], [1, 1], [1, 2], [2, 2]]
# trials_per_condition = 800

[optimizer]
max_iters = 100
initial_step = 0.1
sd_tolerance = 1e-6
num_iterations = 100
step_size = 0.001
temperature = 1.0

[workers]
# threads = 8
"#
}
