use crate::error::{DdmError, Result};
use serde::{Deserialize, Serialize};

/// How the one-step transition between evidence levels is discretized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKernel {
    /// Increment probability integrated over the cell each level owns. The
    /// outermost live cells reach the barriers, so every column sums to one.
    #[default]
    CellIntegrated,
    /// Gaussian density at level differences times the step width. Only
    /// accurate when the step is small against sigma; the renormalization
    /// absorbs the difference.
    PointDensity,
}

/// Discretization settings for the likelihood engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of one time bin in milliseconds.
    pub time_step_ms: u32,
    /// Spacing of evidence levels.
    pub state_step: f64,
    /// Largest per-step gap between mass in and mass out, measured before
    /// renormalization, that propagates without a warning.
    pub conservation_tolerance: f64,
    pub kernel: TransitionKernel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_step_ms: 10,
            state_step: 0.02,
            conservation_tolerance: 1e-6,
            kernel: TransitionKernel::CellIntegrated,
        }
    }
}

impl EngineConfig {
    pub fn with_time_step(mut self, time_step_ms: u32) -> Self {
        self.time_step_ms = time_step_ms;
        self
    }

    pub fn with_state_step(mut self, state_step: f64) -> Self {
        self.state_step = state_step;
        self
    }

    pub fn with_kernel(mut self, kernel: TransitionKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_conservation_tolerance(mut self, tolerance: f64) -> Self {
        self.conservation_tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_step_ms == 0 {
            return Err(DdmError::InvalidParameter("time step must be positive".into()));
        }
        if !(self.state_step > 0.0 && self.state_step.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "state step must be positive, got {}",
                self.state_step
            )));
        }
        if !(self.conservation_tolerance > 0.0) {
            return Err(DdmError::InvalidParameter(
                "conservation tolerance must be positive".into(),
            ));
        }
        Ok(())
    }
}
