//! Derivative-free evolutionary optimizers with a candidate-based ask/tell API.
//!
//! Optimizers work in the unit cube internally; `Parametrization` maps to and
//! from the caller's box.  Candidates produced by `ask` carry a lineage tag
//! so the optimizer can credit the right population slot on `tell`.
//! Candidates built with `Parametrization::spawn_child` carry none and are
//! treated as externally evaluated points.

pub mod de;
pub mod one_plus_one;
pub mod random;
pub mod registry;

use gs_types::AlgorithmError;

/// Box bounds of the search domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Parametrization {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Parametrization {
    pub fn new(bounds: &[(f64, f64)]) -> Result<Self, AlgorithmError> {
        if bounds.is_empty() {
            return Err(AlgorithmError::invalid_input("evolution", "no dimensions"));
        }
        if let Some(i) = bounds
            .iter()
            .position(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo < hi))
        {
            return Err(AlgorithmError::invalid_input(
                "evolution",
                format!("dimension {i} has an empty or non-finite range"),
            ));
        }
        Ok(Self {
            lower: bounds.iter().map(|b| b.0).collect(),
            upper: bounds.iter().map(|b| b.1).collect(),
        })
    }

    pub fn dims(&self) -> usize {
        self.lower.len()
    }

    /// A candidate for a point evaluated outside this optimizer.
    pub fn spawn_child(&self, value: Vec<f64>) -> Candidate {
        Candidate {
            value,
            parent: None,
        }
    }

    pub(crate) fn to_unit(&self, value: &[f64]) -> Result<Vec<f64>, AlgorithmError> {
        if value.len() != self.dims() {
            return Err(AlgorithmError::invalid_input(
                "evolution",
                format!("candidate has {} coordinates, expected {}", value.len(), self.dims()),
            ));
        }
        Ok(value
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(v, (lo, hi))| ((v - lo) / (hi - lo)).clamp(0.0, 1.0))
            .collect())
    }

    pub(crate) fn from_unit(&self, unit: &[f64]) -> Vec<f64> {
        unit.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(u, (lo, hi))| lo + u.clamp(0.0, 1.0) * (hi - lo))
            .collect()
    }

    pub(crate) fn candidate(&self, unit: &[f64], parent: usize) -> Candidate {
        Candidate {
            value: self.from_unit(unit),
            parent: Some(parent),
        }
    }
}

/// A point proposed by (or told to) an optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub value: Vec<f64>,
    /// Population slot or ask index of the optimizer that produced it.
    parent: Option<usize>,
}

impl Candidate {
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }
}

pub trait EvolutionaryOptimizer: Send {
    fn ask(&mut self) -> Candidate;

    fn tell(&mut self, candidate: &Candidate, loss: f64) -> Result<(), AlgorithmError>;

    fn num_ask(&self) -> usize;

    fn num_tell(&self) -> usize;

    fn budget(&self) -> usize;

    fn name(&self) -> &'static str;

    /// Best point told so far and its loss.
    fn recommend(&self) -> Option<(Vec<f64>, f64)>;
}

pub(crate) fn check_loss(engine: &str, loss: f64) -> Result<(), AlgorithmError> {
    if loss.is_finite() {
        Ok(())
    } else {
        Err(AlgorithmError::invalid_input(
            engine,
            format!("loss {loss} is not finite"),
        ))
    }
}

/// Best-so-far bookkeeping shared by the optimizers, in unit coordinates.
#[derive(Debug, Clone, Default)]
pub(crate) struct Incumbent {
    best: Option<(Vec<f64>, f64)>,
}

impl Incumbent {
    /// Returns true when `loss` strictly improves on the incumbent.
    pub(crate) fn offer(&mut self, unit: &[f64], loss: f64) -> bool {
        match &self.best {
            Some((_, b)) if loss >= *b => false,
            _ => {
                self.best = Some((unit.to_vec(), loss));
                true
            }
        }
    }

    pub(crate) fn point(&self) -> Option<&[f64]> {
        self.best.as_ref().map(|(x, _)| x.as_slice())
    }

    pub(crate) fn recommend(&self, param: &Parametrization) -> Option<(Vec<f64>, f64)> {
        self.best
            .as_ref()
            .map(|(x, loss)| (param.from_unit(x), *loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_mapping_round_trips_inside_box() {
        let param = Parametrization::new(&[(-2.0, 2.0), (10.0, 20.0)]).unwrap();
        let unit = param.to_unit(&[0.0, 12.5]).unwrap();
        assert_eq!(unit, vec![0.5, 0.25]);
        assert_eq!(param.from_unit(&unit), vec![0.0, 12.5]);
        assert!(param.to_unit(&[0.0]).is_err());
    }

    #[test]
    fn test_spawned_children_have_no_lineage() {
        let param = Parametrization::new(&[(0.0, 1.0)]).unwrap();
        assert_eq!(param.spawn_child(vec![0.3]).parent(), None);
        assert_eq!(param.candidate(&[0.3], 4).parent(), Some(4));
    }

    #[test]
    fn test_incumbent_keeps_strict_improvements() {
        let mut inc = Incumbent::default();
        assert!(inc.offer(&[0.1], 3.0));
        assert!(!inc.offer(&[0.2], 3.0));
        assert!(inc.offer(&[0.3], 1.0));
        assert_eq!(inc.point(), Some(&[0.3][..]));
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(Parametrization::new(&[]).is_err());
        assert!(Parametrization::new(&[(1.0, 0.0)]).is_err());
        assert!(Parametrization::new(&[(0.0, f64::INFINITY)]).is_err());
    }
}
