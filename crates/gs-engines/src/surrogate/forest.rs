//! Tree-ensemble regressors: random forest and extremely randomized trees.

use gs_types::AlgorithmError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::tree::{RegressionTree, SplitRule, TreeParams};
use super::Regressor;

const N_ESTIMATORS: usize = 100;
const MIN_SAMPLES_LEAF: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForestKind {
    /// Bootstrap resampling, exhaustive split search.
    RandomForest,
    /// Full sample, random thresholds.
    ExtraTrees,
}

pub struct Forest {
    kind: ForestKind,
    n_estimators: usize,
    seed: u64,
    fits: u64,
    trees: Vec<RegressionTree>,
}

impl Forest {
    pub fn new(kind: ForestKind, seed: u64) -> Self {
        Self {
            kind,
            n_estimators: N_ESTIMATORS,
            seed,
            fits: 0,
            trees: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }
}

impl Regressor for Forest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), AlgorithmError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(AlgorithmError::invalid_input(
                self.name(),
                format!("cannot fit on {} points and {} targets", x.len(), y.len()),
            ));
        }
        self.fits += 1;

        let params = TreeParams {
            rule: match self.kind {
                ForestKind::RandomForest => SplitRule::Best,
                ForestKind::ExtraTrees => SplitRule::Random,
            },
            min_samples_leaf: MIN_SAMPLES_LEAF,
            max_depth: None,
            max_features: None,
        };

        // one seed per tree, drawn up front so parallel growth stays deterministic
        let mut seeder = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(self.fits));
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| seeder.gen()).collect();
        let n = x.len();
        let kind = self.kind;

        self.trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let samples: Vec<usize> = match kind {
                    ForestKind::RandomForest => (0..n).map(|_| rng.gen_range(0..n)).collect(),
                    ForestKind::ExtraTrees => (0..n).collect(),
                };
                RegressionTree::fit(x, y, samples, &params, &mut rng)
            })
            .collect();
        Ok(())
    }

    /// Mean of tree predictions; std from the law of total variance over
    /// the trees (spread of tree means plus mean within-leaf variance).
    fn predict(&self, point: &[f64]) -> (f64, f64) {
        if self.trees.is_empty() {
            return (0.0, 1.0);
        }
        let k = self.trees.len() as f64;
        let (sum, second) = self.trees.iter().fold((0.0, 0.0), |(s, q), tree| {
            let (m, v) = tree.predict_with_variance(point);
            (s + m, q + v + m * m)
        });
        let mean = sum / k;
        let var = (second / k - mean * mean).max(0.0);
        (mean, var.sqrt())
    }

    fn name(&self) -> &'static str {
        match self.kind {
            ForestKind::RandomForest => "rf",
            ForestKind::ExtraTrees => "et",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![i as f64 / 39.0, ((i * 7) % 40) as f64 / 39.0])
            .collect();
        let y = x.iter().map(|p| 4.0 * p[0] + p[1]).collect();
        (x, y)
    }

    #[test]
    fn test_forests_track_trend() {
        let (x, y) = linear_data();
        for kind in [ForestKind::RandomForest, ForestKind::ExtraTrees] {
            let mut forest = Forest::new(kind, 11).with_estimators(30);
            forest.fit(&x, &y).unwrap();
            let (low, _) = forest.predict(&[0.05, 0.5]);
            let (high, _) = forest.predict(&[0.95, 0.5]);
            assert!(high > low + 1.5, "{kind:?}: {low} !< {high}");
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = linear_data();
        let mut a = Forest::new(ForestKind::RandomForest, 5).with_estimators(10);
        let mut b = Forest::new(ForestKind::RandomForest, 5).with_estimators(10);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&[0.3, 0.3]), b.predict(&[0.3, 0.3]));
    }

    #[test]
    fn test_std_is_positive_with_few_points() {
        let x = vec![vec![0.1], vec![0.4], vec![0.6], vec![0.9], vec![0.5]];
        let y = vec![1.0, 0.5, 0.2, 0.9, 0.3];
        let mut forest = Forest::new(ForestKind::ExtraTrees, 0).with_estimators(10);
        forest.fit(&x, &y).unwrap();
        let (_, std) = forest.predict(&[0.5]);
        assert!(std > 0.0);
    }
}
