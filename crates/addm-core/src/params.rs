use crate::error::{DdmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Default barrier magnitude.
pub const DEFAULT_BARRIER: f64 = 1.0;

/// Immutable parameter tuple of a (possibly attentional) drift-diffusion model.
///
/// Equality and hashing are structural over the bit patterns of every field,
/// so a DDM tuple never collides with an aDDM tuple sharing `d` and `sigma`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Evidence gained per unit of value difference per time step.
    pub d: f64,
    /// Standard deviation of the per-step increment.
    pub sigma: f64,
    /// Attentional discount on the unattended item (aDDM only).
    pub theta: Option<f64>,
    pub barrier: f64,
    /// Hyperbolic barrier collapse rate; 0 keeps barriers constant.
    pub decay: f64,
}

impl ModelParameters {
    pub fn ddm(d: f64, sigma: f64) -> Self {
        Self {
            d,
            sigma,
            theta: None,
            barrier: DEFAULT_BARRIER,
            decay: 0.0,
        }
    }

    pub fn addm(d: f64, theta: f64, sigma: f64) -> Self {
        Self {
            theta: Some(theta),
            ..Self::ddm(d, sigma)
        }
    }

    pub fn with_barrier(mut self, barrier: f64) -> Self {
        self.barrier = barrier;
        self
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn is_attentional(&self) -> bool {
        self.theta.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.d.is_finite() {
            return Err(DdmError::InvalidParameter(format!("d must be finite, got {}", self.d)));
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if !(self.barrier > 0.0 && self.barrier.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "barrier must be positive, got {}",
                self.barrier
            )));
        }
        if !(self.decay >= 0.0 && self.decay.is_finite()) {
            return Err(DdmError::InvalidParameter(format!(
                "barrier decay must be non-negative, got {}",
                self.decay
            )));
        }
        if let Some(theta) = self.theta {
            if !(theta >= 0.0 && theta.is_finite()) {
                return Err(DdmError::InvalidParameter(format!(
                    "theta must be non-negative, got {theta}"
                )));
            }
        }
        Ok(())
    }

    /// Barrier magnitude at time step `t`.
    pub fn barrier_at(&self, t: usize) -> f64 {
        self.barrier / (1.0 + self.decay * t as f64)
    }

    fn key(&self) -> [u64; 6] {
        // -0.0 and 0.0 must hash alike
        let bits = |x: f64| if x == 0.0 { 0u64 } else { x.to_bits() };
        [
            bits(self.d),
            bits(self.sigma),
            self.theta.is_some() as u64,
            self.theta.map(bits).unwrap_or(0),
            bits(self.barrier),
            bits(self.decay),
        ]
    }
}

impl PartialEq for ModelParameters {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ModelParameters {}

impl Hash for ModelParameters {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for ModelParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.theta {
            Some(theta) => write!(f, "(d={}, theta={}, sigma={})", self.d, theta, self.sigma),
            None => write!(f, "(d={}, sigma={})", self.d, self.sigma),
        }
    }
}
