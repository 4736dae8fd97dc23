use thiserror::Error;

/// Errors raised by the probability engine and its collaborators.
///
/// A likelihood of exactly zero is a valid result, never an error.
#[derive(Debug, Error)]
pub enum DdmError {
    /// Non-positive barrier, state step or sigma, or a discretization that
    /// does not line up with the barrier.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Trial too short to occupy a single time step.
    #[error("invalid trial: {0}")]
    InvalidTrial(String),

    /// The sampled walk did not reach a barrier in time.
    #[error("simulation did not reach a barrier within {max_steps} steps")]
    SimulationTimeout { max_steps: usize },

    #[error("{context}: {source}")]
    DataLoadFailure {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// One or more workers failed while evaluating a trial against the grid.
    #[error("{failed} of {total} likelihood evaluations failed for trial {trial_index}: {first}")]
    LikelihoodBatch {
        trial_index: usize,
        failed: usize,
        total: usize,
        first: Box<DdmError>,
    },

    #[error("optimizer error: {0}")]
    Optimizer(String),
}

impl DdmError {
    pub fn data_load(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DataLoadFailure {
            context: context.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DdmError>;
