//! Gradient-boosted quantile regression trees.
//!
//! Three boosters are trained on the pinball loss at the 16th, 50th and 84th
//! percentiles.  The median booster gives the mean estimate and half the
//! 16..84 spread stands in for one standard deviation.

use gs_types::AlgorithmError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

use super::tree::{RegressionTree, SplitRule, TreeParams};
use super::Regressor;
use crate::numeric::quantile;

const QUANTILES: [f64; 3] = [0.16, 0.5, 0.84];
const N_ESTIMATORS: usize = 30;
const LEARNING_RATE: f64 = 0.1;
const MAX_DEPTH: usize = 3;

struct QuantileBooster {
    alpha: f64,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl QuantileBooster {
    fn fit(alpha: f64, x: &[Vec<f64>], y: &[f64], rng: &mut ChaCha8Rng) -> Self {
        let init = quantile(y, alpha);
        let mut current = vec![init; y.len()];
        let params = TreeParams {
            rule: SplitRule::Best,
            min_samples_leaf: 1,
            max_depth: Some(MAX_DEPTH),
            max_features: None,
        };

        let mut trees = Vec::with_capacity(N_ESTIMATORS);
        for _ in 0..N_ESTIMATORS {
            let gradient: Vec<f64> = y
                .iter()
                .zip(&current)
                .map(|(t, f)| if t > f { alpha } else { alpha - 1.0 })
                .collect();
            let mut tree = RegressionTree::fit(x, &gradient, (0..y.len()).collect(), &params, rng);

            // Re-estimate each leaf as the alpha-quantile of its residuals.
            let mut residuals: HashMap<usize, Vec<f64>> = HashMap::new();
            for (i, point) in x.iter().enumerate() {
                residuals
                    .entry(tree.leaf_id(point))
                    .or_default()
                    .push(y[i] - current[i]);
            }
            let mut leaves: Vec<_> = residuals.into_iter().collect();
            leaves.sort_by_key(|(leaf, _)| *leaf);
            for (leaf, r) in leaves {
                tree.set_leaf_value(leaf, quantile(&r, alpha));
            }

            for (i, point) in x.iter().enumerate() {
                current[i] += LEARNING_RATE * tree.predict(point);
            }
            trees.push(tree);
        }

        Self { alpha, init, trees }
    }

    fn predict(&self, point: &[f64]) -> f64 {
        self.init
            + LEARNING_RATE * self.trees.iter().map(|t| t.predict(point)).sum::<f64>()
    }
}

pub struct GradientBoosting {
    seed: u64,
    boosters: Vec<QuantileBooster>,
}

impl GradientBoosting {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            boosters: Vec::new(),
        }
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), AlgorithmError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(AlgorithmError::invalid_input(
                "gbrt",
                format!("cannot fit on {} points and {} targets", x.len(), y.len()),
            ));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.boosters = QUANTILES
            .iter()
            .map(|&alpha| QuantileBooster::fit(alpha, x, y, &mut rng))
            .collect();
        Ok(())
    }

    fn predict(&self, point: &[f64]) -> (f64, f64) {
        let [low, mid, high] = match self.boosters.as_slice() {
            [a, b, c] => [a.predict(point), b.predict(point), c.predict(point)],
            _ => return (0.0, 1.0),
        };
        debug_assert!(self.boosters[1].alpha == 0.5);
        (mid, ((high - low) / 2.0).abs())
    }

    fn name(&self) -> &'static str {
        "gbrt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_follows_data() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64 / 29.0]).collect();
        let y: Vec<f64> = x.iter().map(|p| 10.0 * p[0]).collect();
        let mut model = GradientBoosting::new(1);
        model.fit(&x, &y).unwrap();
        let (low, _) = model.predict(&[0.1]);
        let (high, _) = model.predict(&[0.9]);
        assert!(high > low + 3.0, "{low} vs {high}");
    }

    #[test]
    fn test_spread_reflects_noise() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 2) as f64]).collect();
        // identical inputs with alternating targets -> irreducible spread
        let y: Vec<f64> = (0..40).map(|i| if i % 4 < 2 { 0.0 } else { 2.0 }).collect();
        let mut model = GradientBoosting::new(0);
        model.fit(&x, &y).unwrap();
        let (_, std) = model.predict(&[0.0]);
        assert!(std > 0.1, "std {std}");
    }
}
