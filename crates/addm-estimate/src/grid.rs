use addm_core::{DdmError, ModelParameters, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Finite set of candidate parameter tuples, in enumeration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelGrid {
    models: Vec<ModelParameters>,
}

impl ModelGrid {
    pub fn new(models: Vec<ModelParameters>) -> Result<Self> {
        if models.is_empty() {
            return Err(DdmError::InvalidParameter("model grid is empty".into()));
        }
        let mut seen = HashSet::with_capacity(models.len());
        for model in &models {
            model.validate()?;
            if !seen.insert(*model) {
                return Err(DdmError::InvalidParameter(format!("duplicate model {model} in grid")));
            }
        }
        Ok(Self { models })
    }

    /// Cartesian product over `d` and `sigma`.
    pub fn ddm(range_d: &[f64], range_sigma: &[f64]) -> Result<Self> {
        let mut models = Vec::with_capacity(range_d.len() * range_sigma.len());
        for &d in range_d {
            for &sigma in range_sigma {
                models.push(ModelParameters::ddm(d, sigma));
            }
        }
        Self::new(models)
    }

    /// Cartesian product over `d`, `theta` and `sigma`.
    pub fn addm(range_d: &[f64], range_theta: &[f64], range_sigma: &[f64]) -> Result<Self> {
        let mut models = Vec::with_capacity(range_d.len() * range_theta.len() * range_sigma.len());
        for &d in range_d {
            for &theta in range_theta {
                for &sigma in range_sigma {
                    models.push(ModelParameters::addm(d, theta, sigma));
                }
            }
        }
        Self::new(models)
    }

    /// Same grid with a shared barrier and decay.
    pub fn with_barrier(self, barrier: f64, decay: f64) -> Result<Self> {
        Self::new(
            self.models
                .into_iter()
                .map(|m| m.with_barrier(barrier).with_decay(decay))
                .collect(),
        )
    }

    pub fn models(&self) -> &[ModelParameters] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddm_grid_order() {
        let grid = ModelGrid::ddm(&[0.005, 0.006], &[0.065, 0.08, 0.095]).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.models()[0], ModelParameters::ddm(0.005, 0.065));
        assert_eq!(grid.models()[4], ModelParameters::ddm(0.006, 0.08));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(ModelGrid::ddm(&[0.005, 0.005], &[0.08]).is_err());
        assert!(ModelGrid::ddm(&[], &[0.08]).is_err());
        assert!(ModelGrid::ddm(&[0.005], &[-0.08]).is_err());
    }

    #[test]
    fn test_addm_grid() {
        let grid = ModelGrid::addm(&[0.005, 0.006], &[0.4, 0.5], &[0.08])
            .unwrap()
            .with_barrier(1.2, 0.0)
            .unwrap();
        assert_eq!(grid.len(), 4);
        assert!(grid.models().iter().all(|m| m.is_attentional() && m.barrier == 1.2));
    }
}
