//! Gaussian-process regressor with a Matérn 5/2 kernel.
//!
//! Inputs are expected in the unit cube (the surrogate optimizer normalizes
//! before fitting).  Targets are standardized, and a single isotropic
//! lengthscale is picked from a fixed grid by maximum log marginal
//! likelihood.

use gs_types::AlgorithmError;
use nalgebra::{DMatrix, DVector, Dyn};
use tracing::warn;

use super::Regressor;

const SQRT_5: f64 = 2.236_067_977_499_79;
const LENGTHSCALE_GRID: [f64; 8] = [0.05, 0.1, 0.2, 0.35, 0.5, 0.75, 1.0, 1.5];
/// White-noise variance added to the (standardized) kernel diagonal.
const DEFAULT_NOISE: f64 = 1e-6;
/// Larger training sets are cut to their lowest objectives before fitting.
pub const MAX_TRAIN_POINTS: usize = 500;

fn matern52(a: &[f64], b: &[f64], lengthscale: f64) -> f64 {
    let r_sq: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| ((x - y) / lengthscale).powi(2))
        .sum();
    let r = r_sq.sqrt();
    let s = SQRT_5 * r;
    (1.0 + s + 5.0 / 3.0 * r_sq) * (-s).exp()
}

/// The `k` lowest-objective points, in their original order.
fn lowest(x: &[Vec<f64>], y: &[f64], k: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut order: Vec<usize> = (0..y.len()).collect();
    order.sort_by(|&a, &b| y[a].total_cmp(&y[b]).then(a.cmp(&b)));
    order.truncate(k);
    order.sort_unstable();
    order.iter().map(|&i| (x[i].clone(), y[i])).unzip()
}

struct GpFit {
    x: Vec<Vec<f64>>,
    cholesky: nalgebra::linalg::Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    lengthscale: f64,
    y_mean: f64,
    y_std: f64,
}

pub struct GaussianProcess {
    noise: f64,
    fit: Option<GpFit>,
}

impl GaussianProcess {
    pub fn new() -> Self {
        Self {
            noise: DEFAULT_NOISE,
            fit: None,
        }
    }

    /// Lengthscale chosen by the last fit.
    pub fn lengthscale(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.lengthscale)
    }

    fn fit_with(
        &self,
        x: &[Vec<f64>],
        y_std: &[f64],
        lengthscale: f64,
    ) -> Option<(nalgebra::linalg::Cholesky<f64, Dyn>, DVector<f64>, f64)> {
        let n = x.len();
        let k = DMatrix::from_fn(n, n, |i, j| {
            let v = matern52(&x[i], &x[j], lengthscale);
            if i == j {
                v + self.noise
            } else {
                v
            }
        });
        let cholesky = nalgebra::linalg::Cholesky::new(k)?;
        let y = DVector::from_column_slice(y_std);
        let alpha = cholesky.solve(&y);

        let log_det: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        let lml = -0.5 * y.dot(&alpha) - log_det - 0.5 * n as f64 * (std::f64::consts::TAU).ln();
        lml.is_finite().then_some((cholesky, alpha, lml))
    }
}

impl Default for GaussianProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for GaussianProcess {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), AlgorithmError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(AlgorithmError::invalid_input(
                "gp",
                format!("cannot fit on {} points and {} targets", x.len(), y.len()),
            ));
        }

        let subset;
        let (x, y) = if y.len() > MAX_TRAIN_POINTS {
            warn!(
                points = y.len(),
                kept = MAX_TRAIN_POINTS,
                "gp training set truncated to its lowest objectives"
            );
            subset = lowest(x, y, MAX_TRAIN_POINTS);
            (subset.0.as_slice(), subset.1.as_slice())
        } else {
            (x, y)
        };

        let n = y.len() as f64;
        let y_mean = y.iter().sum::<f64>() / n;
        let y_std = if y.len() > 1 {
            (y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / (n - 1.0))
                .sqrt()
                .max(1e-12)
        } else {
            1.0
        };
        let standardized: Vec<f64> = y.iter().map(|v| (v - y_mean) / y_std).collect();

        let mut best: Option<(f64, nalgebra::linalg::Cholesky<f64, Dyn>, DVector<f64>, f64)> = None;
        for &ls in &LENGTHSCALE_GRID {
            if let Some((chol, alpha, lml)) = self.fit_with(x, &standardized, ls) {
                if best.as_ref().map_or(true, |b| lml > b.3) {
                    best = Some((ls, chol, alpha, lml));
                }
            }
        }

        let (lengthscale, cholesky, alpha, _) = best.ok_or_else(|| {
            AlgorithmError::numerical("gp", "kernel matrix not positive definite for any lengthscale")
        })?;

        self.fit = Some(GpFit {
            x: x.to_vec(),
            cholesky,
            alpha,
            lengthscale,
            y_mean,
            y_std,
        });
        Ok(())
    }

    fn predict(&self, point: &[f64]) -> (f64, f64) {
        let Some(fit) = &self.fit else {
            return (0.0, 1.0);
        };
        let k_star = DVector::from_fn(fit.x.len(), |i, _| matern52(point, &fit.x[i], fit.lengthscale));
        let mean = k_star.dot(&fit.alpha);
        let v = fit.cholesky.solve(&k_star);
        let var = (1.0 - k_star.dot(&v)).max(0.0);
        (mean * fit.y_std + fit.y_mean, var.sqrt() * fit.y_std)
    }

    fn name(&self) -> &'static str {
        "gp"
    }
}
