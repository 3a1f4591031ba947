//! Sequential model-based optimization over a box.
//!
//! `SurrogateOptimizer` is an ask/tell minimizer: it fits a regressor to the
//! told points (in unit coordinates) and proposes the minimizer of an
//! acquisition function.  Until `n_initial_points` have been told it proposes
//! uniform random points.

pub mod acquisition;
pub mod forest;
pub mod gbrt;
pub mod gp;
pub mod tree;

use gs_types::AlgorithmError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use acquisition::{AcqOptimizerKind, AcquisitionKind};
use acquisition::{AcqFn, AcqParams, HedgeState, SearchBudget, HEDGE_MEMBERS};
use forest::{Forest, ForestKind};
use gbrt::GradientBoosting;
use gp::GaussianProcess;

use crate::numeric::unit_point;

/// A probabilistic regression model: point predictions with uncertainty.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), AlgorithmError>;

    /// `(mean, std)` at `x`.
    fn predict(&self, x: &[f64]) -> (f64, f64);

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegressorKind {
    GaussianProcess,
    RandomForest,
    ExtraTrees,
    GradientBoosting,
}

impl RegressorKind {
    /// "GP", "RF", "ET" or "GBRT", any case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GP" => Some(Self::GaussianProcess),
            "RF" => Some(Self::RandomForest),
            "ET" => Some(Self::ExtraTrees),
            "GBRT" => Some(Self::GradientBoosting),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::GaussianProcess => "GP",
            Self::RandomForest => "RF",
            Self::ExtraTrees => "ET",
            Self::GradientBoosting => "GBRT",
        }
    }

    pub fn build(self, seed: u64) -> Box<dyn Regressor> {
        match self {
            Self::GaussianProcess => Box::new(GaussianProcess::new()),
            Self::RandomForest => Box::new(Forest::new(ForestKind::RandomForest, seed)),
            Self::ExtraTrees => Box::new(Forest::new(ForestKind::ExtraTrees, seed)),
            Self::GradientBoosting => Box::new(GradientBoosting::new(seed)),
        }
    }

    /// What "auto" resolves to: gradient refinement only pays off on the
    /// smooth GP surface.
    pub fn default_acq_optimizer(self) -> AcqOptimizerKind {
        match self {
            Self::GaussianProcess => AcqOptimizerKind::Lbfgs,
            _ => AcqOptimizerKind::Sampling,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurrogateConfig {
    pub regressor: RegressorKind,
    pub acquisition: AcquisitionKind,
    /// `None` resolves per regressor.
    pub acq_optimizer: Option<AcqOptimizerKind>,
    pub n_initial_points: usize,
    pub kappa: f64,
    pub xi: f64,
    pub n_candidates: usize,
    pub n_restarts: usize,
    pub seed: u64,
}

impl SurrogateConfig {
    pub fn new(regressor: RegressorKind, seed: u64) -> Self {
        Self {
            regressor,
            acquisition: AcquisitionKind::ExpectedImprovement,
            acq_optimizer: None,
            n_initial_points: 5,
            kappa: 1.96,
            xi: 0.01,
            n_candidates: 2000,
            n_restarts: 5,
            seed,
        }
    }

    fn params(&self) -> AcqParams {
        AcqParams {
            kappa: self.kappa,
            xi: self.xi,
        }
    }

    fn budget(&self) -> SearchBudget {
        SearchBudget {
            n_candidates: self.n_candidates,
            n_restarts: self.n_restarts,
        }
    }
}

pub struct SurrogateOptimizer {
    bounds: Vec<(f64, f64)>,
    config: SurrogateConfig,
    x_unit: Vec<Vec<f64>>,
    y: Vec<f64>,
    model: Option<Box<dyn Regressor>>,
    hedge: HedgeState,
    rng: ChaCha8Rng,
}

impl SurrogateOptimizer {
    pub fn new(bounds: Vec<(f64, f64)>, config: SurrogateConfig) -> Result<Self, AlgorithmError> {
        if bounds.is_empty() {
            return Err(AlgorithmError::invalid_input("surrogate", "no dimensions"));
        }
        if let Some(i) = bounds
            .iter()
            .position(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo < hi))
        {
            return Err(AlgorithmError::invalid_input(
                "surrogate",
                format!("dimension {i} has an empty or non-finite range"),
            ));
        }
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            bounds,
            config,
            x_unit: Vec::new(),
            y: Vec::new(),
            model: None,
            hedge: HedgeState::default(),
            rng,
        })
    }

    pub fn n_told(&self) -> usize {
        self.y.len()
    }

    pub fn config(&self) -> &SurrogateConfig {
        &self.config
    }

    /// Add observations and refit once on everything told so far.
    pub fn tell(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), AlgorithmError> {
        if x.len() != y.len() {
            return Err(AlgorithmError::invalid_input(
                "surrogate",
                format!("{} points but {} objectives", x.len(), y.len()),
            ));
        }
        if let Some(i) = y.iter().position(|v| !v.is_finite()) {
            return Err(AlgorithmError::invalid_input(
                "surrogate",
                format!("objective {i} is not finite"),
            ));
        }
        let units = x
            .iter()
            .map(|p| self.to_unit(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.x_unit.extend(units);
        self.y.extend_from_slice(y);

        if self.y.len() >= self.config.n_initial_points {
            let mut model = self.config.regressor.build(self.config.seed);
            model.fit(&self.x_unit, &self.y)?;
            self.hedge.update(model.as_ref());
            self.model = Some(model);
            debug!(
                regressor = self.config.regressor.code(),
                n_told = self.y.len(),
                "surrogate model refit"
            );
        }
        Ok(())
    }

    /// Propose `n` points.  More than one point uses the constant liar:
    /// each proposal is provisionally told with the best observed objective
    /// and the model refit before the next one.
    pub fn ask(&mut self, n: usize) -> Result<Vec<Vec<f64>>, AlgorithmError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if n == 1 {
            let mut hedge = std::mem::take(&mut self.hedge);
            let model = self.model.as_deref();
            let unit = Self::propose(
                &self.config,
                self.bounds.len(),
                self.x_unit.len(),
                self.y.iter().copied().fold(f64::INFINITY, f64::min),
                model,
                &mut hedge,
                &mut self.rng,
            );
            self.hedge = hedge;
            return Ok(vec![self.from_unit(&unit?)]);
        }

        let lie = self.y.iter().copied().fold(f64::INFINITY, f64::min);
        let mut x = self.x_unit.clone();
        let mut y = self.y.clone();
        let mut hedge = self.hedge.clone();
        let mut local: Option<Box<dyn Regressor>> = None;
        let mut out = Vec::with_capacity(n);

        for i in 0..n {
            let model = if i == 0 {
                self.model.as_deref()
            } else {
                local.as_deref()
            };
            let y_best = y.iter().copied().fold(f64::INFINITY, f64::min);
            let unit = Self::propose(
                &self.config,
                self.bounds.len(),
                x.len(),
                y_best,
                model,
                &mut hedge,
                &mut self.rng,
            )?;
            out.push(self.from_unit(&unit));

            if i + 1 == n {
                break;
            }
            x.push(unit);
            // With nothing observed yet the lie is irrelevant: those asks are random.
            y.push(if lie.is_finite() { lie } else { 0.0 });
            if y.len() >= self.config.n_initial_points && lie.is_finite() {
                let mut refit = self.config.regressor.build(self.config.seed);
                refit.fit(&x, &y)?;
                hedge.update(refit.as_ref());
                local = Some(refit);
            }
        }
        debug!(n, lie, "constant-liar batch proposed");
        Ok(out)
    }

    /// One proposal in unit coordinates given `n_points` seen (real or lied).
    fn propose(
        config: &SurrogateConfig,
        dims: usize,
        n_points: usize,
        y_best: f64,
        model: Option<&dyn Regressor>,
        hedge: &mut HedgeState,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<f64>, AlgorithmError> {
        let model = match model {
            Some(m) if n_points >= config.n_initial_points => m,
            _ => return Ok(unit_point(rng, dims)),
        };
        let optimizer = config
            .acq_optimizer
            .unwrap_or_else(|| config.regressor.default_acq_optimizer());
        let run = |f: AcqFn, rng: &mut ChaCha8Rng| {
            acquisition::minimize(
                model,
                f,
                y_best,
                config.params(),
                optimizer,
                config.budget(),
                dims,
                rng,
            )
            .map(|(x, _)| x)
        };

        match config.acquisition {
            AcquisitionKind::ExpectedImprovement => run(AcqFn::Ei, rng),
            AcquisitionKind::ProbabilityOfImprovement => run(AcqFn::Pi, rng),
            AcquisitionKind::LowerConfidenceBound => run(AcqFn::Lcb, rng),
            AcquisitionKind::Hedge => {
                let [ei, lcb, pi] = HEDGE_MEMBERS;
                let proposals = [run(ei, rng)?, run(lcb, rng)?, run(pi, rng)?];
                let chosen = hedge.choose(rng);
                let point = proposals[chosen].clone();
                hedge.last_proposals = Some(proposals);
                Ok(point)
            }
        }
    }

    fn to_unit(&self, point: &[f64]) -> Result<Vec<f64>, AlgorithmError> {
        if point.len() != self.bounds.len() {
            return Err(AlgorithmError::invalid_input(
                "surrogate",
                format!("point has {} coordinates, expected {}", point.len(), self.bounds.len()),
            ));
        }
        Ok(point
            .iter()
            .zip(&self.bounds)
            .map(|(v, (lo, hi))| (v - lo) / (hi - lo))
            .collect())
    }

    fn from_unit(&self, unit: &[f64]) -> Vec<f64> {
        unit.iter()
            .zip(&self.bounds)
            .map(|(u, (lo, hi))| lo + u.clamp(0.0, 1.0) * (hi - lo))
            .collect()
    }
}
