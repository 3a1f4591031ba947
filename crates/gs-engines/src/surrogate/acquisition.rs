//! Acquisition functions and their optimization over the unit cube.
//!
//! All acquisition values are expressed so that lower is better, which makes
//! EI, PI and LCB interchangeable inside the hedge strategy.

use gs_types::AlgorithmError;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::Regressor;
use crate::numeric::{argmin, norm_cdf, norm_pdf, unit_point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionKind {
    ExpectedImprovement,
    ProbabilityOfImprovement,
    LowerConfidenceBound,
    /// Softmax portfolio over EI, LCB and PI.
    Hedge,
}

impl AcquisitionKind {
    /// Parse the short names callers use ("EI", "PI", "LCB", "gp_hedge").
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ei" => Some(Self::ExpectedImprovement),
            "pi" => Some(Self::ProbabilityOfImprovement),
            "lcb" => Some(Self::LowerConfidenceBound),
            "gp_hedge" | "hedge" => Some(Self::Hedge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcqOptimizerKind {
    /// Pick the best of a batch of uniform candidates.
    Sampling,
    /// Sampling followed by projected gradient refinement of the best few.
    Lbfgs,
}

impl AcqOptimizerKind {
    /// Parse "sampling" / "lbfgs"; "auto" resolves to `None` so the caller can
    /// choose based on the regressor.
    pub fn parse(name: &str) -> Result<Option<Self>, ()> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Ok(None),
            "sampling" => Ok(Some(Self::Sampling)),
            "lbfgs" => Ok(Some(Self::Lbfgs)),
            _ => Err(()),
        }
    }
}

/// A single (non-portfolio) acquisition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcqFn {
    Ei,
    Lcb,
    Pi,
}

/// Hedge portfolio order.
pub const HEDGE_MEMBERS: [AcqFn; 3] = [AcqFn::Ei, AcqFn::Lcb, AcqFn::Pi];

#[derive(Debug, Clone, Copy)]
pub struct AcqParams {
    pub kappa: f64,
    pub xi: f64,
}

impl AcqFn {
    pub fn value(self, mean: f64, std: f64, y_best: f64, params: AcqParams) -> f64 {
        match self {
            AcqFn::Lcb => mean - params.kappa * std,
            AcqFn::Ei => {
                let improvement = y_best - mean - params.xi;
                if std <= 1e-12 {
                    return -improvement.max(0.0);
                }
                let z = improvement / std;
                -(improvement * norm_cdf(z) + std * norm_pdf(z))
            }
            AcqFn::Pi => {
                let improvement = y_best - mean - params.xi;
                if std <= 1e-12 {
                    return if improvement > 0.0 { -1.0 } else { 0.0 };
                }
                -norm_cdf(improvement / std)
            }
        }
    }
}

/// Running gains of the hedge portfolio.
#[derive(Debug, Clone, Default)]
pub struct HedgeState {
    pub gains: [f64; 3],
    /// Each member's last proposal, in unit coordinates.
    pub last_proposals: Option<[Vec<f64>; 3]>,
}

impl HedgeState {
    /// Penalize each member by the refit model's prediction at its last
    /// proposal.
    pub fn update(&mut self, model: &dyn Regressor) {
        if let Some(proposals) = self.last_proposals.take() {
            for (gain, x) in self.gains.iter_mut().zip(proposals.iter()) {
                *gain -= model.predict(x).0;
            }
        }
    }

    /// Draw a member with softmax(eta * gains) probabilities, eta = 1.
    pub fn choose(&self, rng: &mut ChaCha8Rng) -> usize {
        let max = self.gains.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = self.gains.iter().map(|g| (g - max).exp()).collect();
        let total: f64 = weights.iter().sum();
        let mut draw = rng.gen::<f64>() * total;
        for (i, w) in weights.iter().enumerate() {
            if draw < *w {
                return i;
            }
            draw -= w;
        }
        weights.len() - 1
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchBudget {
    pub n_candidates: usize,
    pub n_restarts: usize,
}

/// Minimize `f` over `[0, 1]^dims`.  Candidates are drawn sequentially from
/// `rng` and scored in parallel, so the result is deterministic per seed.
pub fn minimize(
    model: &dyn Regressor,
    f: AcqFn,
    y_best: f64,
    params: AcqParams,
    optimizer: AcqOptimizerKind,
    budget: SearchBudget,
    dims: usize,
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<f64>, f64), AlgorithmError> {
    let score = |x: &[f64]| {
        let (mean, std) = model.predict(x);
        let v = f.value(mean, std, y_best, params);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let candidates: Vec<Vec<f64>> = (0..budget.n_candidates.max(1))
        .map(|_| unit_point(rng, dims))
        .collect();
    let scores: Vec<f64> = candidates.par_iter().map(|x| score(x)).collect();

    let (x, value) = match optimizer {
        AcqOptimizerKind::Sampling => {
            let best = argmin(&scores).unwrap_or(0);
            (candidates[best].clone(), scores[best])
        }
        AcqOptimizerKind::Lbfgs => {
            let mut order: Vec<usize> = (0..scores.len()).collect();
            order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));
            let starts: Vec<&Vec<f64>> = order
                .iter()
                .take(budget.n_restarts.max(1))
                .map(|&i| &candidates[i])
                .collect();

            let refined: Vec<(Vec<f64>, f64)> = starts
                .par_iter()
                .map(|start| projected_descent(start, &score))
                .collect();
            let values: Vec<f64> = refined.iter().map(|(_, v)| *v).collect();
            let best = argmin(&values).unwrap_or(0);
            refined[best].clone()
        }
    };
    if !value.is_finite() {
        return Err(AlgorithmError::not_converged(
            "acquisition",
            format!("{f:?} is not finite at any of {} candidates", candidates.len()),
        ));
    }
    Ok((x, value))
}

/// Box-constrained descent with central-difference gradients and
/// backtracking.
fn projected_descent<F>(start: &[f64], score: &F) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    const H: f64 = 1e-4;
    const MAX_ITERS: usize = 40;

    let mut x = start.to_vec();
    let mut fx = score(&x);
    let mut step = 0.1;

    for _ in 0..MAX_ITERS {
        let mut grad = vec![0.0; x.len()];
        for k in 0..x.len() {
            let mut up = x.clone();
            let mut down = x.clone();
            up[k] = (up[k] + H).min(1.0);
            down[k] = (down[k] - H).max(0.0);
            let width = up[k] - down[k];
            if width > 0.0 {
                grad[k] = (score(&up) - score(&down)) / width;
            }
        }
        let norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
        if !norm.is_finite() || norm < 1e-12 {
            break;
        }

        let mut improved = false;
        while step > 1e-6 {
            let trial: Vec<f64> = x
                .iter()
                .zip(&grad)
                .map(|(xi, gi)| (xi - step * gi / norm).clamp(0.0, 1.0))
                .collect();
            let ft = score(&trial);
            if ft < fx {
                x = trial;
                fx = ft;
                improved = true;
                step *= 1.5;
                break;
            }
            step *= 0.5;
        }
        if !improved {
            break;
        }
    }
    (x, fx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::AlgorithmError;
    use rand::SeedableRng;

    /// Bowl with its minimum at (0.3, 0.7) and constant uncertainty.
    struct Bowl;

    impl Regressor for Bowl {
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[f64]) -> Result<(), AlgorithmError> {
            Ok(())
        }
        fn predict(&self, x: &[f64]) -> (f64, f64) {
            ((x[0] - 0.3).powi(2) + (x[1] - 0.7).powi(2), 0.1)
        }
        fn name(&self) -> &'static str {
            "bowl"
        }
    }

    const PARAMS: AcqParams = AcqParams { kappa: 1.96, xi: 0.01 };

    #[test]
    fn test_parse_names() {
        assert_eq!(AcquisitionKind::parse("EI"), Some(AcquisitionKind::ExpectedImprovement));
        assert_eq!(AcquisitionKind::parse("gp_hedge"), Some(AcquisitionKind::Hedge));
        assert_eq!(AcquisitionKind::parse("ucb"), None);
        assert_eq!(AcqOptimizerKind::parse("auto"), Ok(None));
        assert_eq!(AcqOptimizerKind::parse("LBFGS"), Ok(Some(AcqOptimizerKind::Lbfgs)));
        assert!(AcqOptimizerKind::parse("newton").is_err());
    }

    #[test]
    fn test_lower_mean_scores_better() {
        for f in HEDGE_MEMBERS {
            let good = f.value(0.0, 0.1, 0.5, PARAMS);
            let bad = f.value(1.0, 0.1, 0.5, PARAMS);
            assert!(good < bad, "{f:?}");
        }
    }

    #[test]
    fn test_refinement_beats_sampling() {
        let budget = SearchBudget {
            n_candidates: 50,
            n_restarts: 3,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let (sampled, s_val) = minimize(
            &Bowl,
            AcqFn::Lcb,
            0.0,
            PARAMS,
            AcqOptimizerKind::Sampling,
            budget,
            2,
            &mut rng,
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let (refined, r_val) = minimize(
            &Bowl,
            AcqFn::Lcb,
            0.0,
            PARAMS,
            AcqOptimizerKind::Lbfgs,
            budget,
            2,
            &mut rng,
        )
        .unwrap();
        assert!(r_val <= s_val);
        assert!((refined[0] - 0.3).abs() < 0.01, "{refined:?}");
        assert!((refined[1] - 0.7).abs() < 0.01, "{refined:?}");
        assert!(sampled.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    /// A model whose predictions are all NaN.
    struct Broken;

    impl Regressor for Broken {
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[f64]) -> Result<(), AlgorithmError> {
            Ok(())
        }
        fn predict(&self, _x: &[f64]) -> (f64, f64) {
            (f64::NAN, f64::NAN)
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_no_finite_acquisition_is_not_converged() {
        let budget = SearchBudget {
            n_candidates: 20,
            n_restarts: 2,
        };
        for optimizer in [AcqOptimizerKind::Sampling, AcqOptimizerKind::Lbfgs] {
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            let err = minimize(&Broken, AcqFn::Ei, 0.0, PARAMS, optimizer, budget, 2, &mut rng)
                .unwrap_err();
            assert!(matches!(err, AlgorithmError::NotConverged { .. }), "{err}");
        }
    }

    #[test]
    fn test_hedge_prefers_higher_gain() {
        let state = HedgeState {
            gains: [5.0, 0.0, 0.0],
            last_proposals: None,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let picks = (0..200).filter(|_| state.choose(&mut rng) == 0).count();
        assert!(picks > 180);
    }

    #[test]
    fn test_hedge_update_consumes_proposals() {
        let mut state = HedgeState {
            gains: [0.0; 3],
            last_proposals: Some([vec![0.3, 0.7], vec![0.0, 0.0], vec![1.0, 1.0]]),
        };
        state.update(&Bowl);
        assert!(state.last_proposals.is_none());
        assert!(state.gains[0] > state.gains[1]);
        assert!(state.gains[0] > state.gains[2]);
    }
}
