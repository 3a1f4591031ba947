//! Filling a short batch up to the requested size.

use std::str::FromStr;

use gs_types::SearchSpace;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaddingPolicy {
    /// Independent uniform draw per dimension.
    #[default]
    Uniform,
    /// One stratum per padded point on every dimension.
    LatinHypercube,
}

impl FromStr for PaddingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "latin-hypercube" | "lhs" => Ok(Self::LatinHypercube),
            other => Err(format!(
                "unknown padding policy '{other}' (expected uniform or latin-hypercube)"
            )),
        }
    }
}

impl PaddingPolicy {
    pub fn sample(self, space: &SearchSpace, n: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
        match self {
            Self::Uniform => uniform_points(space, n, rng),
            Self::LatinHypercube => latin_hypercube(space, n, rng),
        }
    }
}

/// `n` points drawn uniformly inside the bounds.
pub fn uniform_points(space: &SearchSpace, n: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    (0..n)
        .map(|_| {
            space
                .dimensions()
                .iter()
                .map(|d| rng.gen_range(d.low..=d.high))
                .collect()
        })
        .collect()
}

fn latin_hypercube(space: &SearchSpace, n: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let mut points = vec![Vec::with_capacity(space.len()); n];
    for dim in space.dimensions() {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(rng);
        let step = dim.width() / n as f64;
        for (point, stratum) in points.iter_mut().zip(strata) {
            let offset: f64 = rng.gen();
            let v = dim.low + (stratum as f64 + offset) * step;
            point.push(v.min(dim.high));
        }
    }
    points
}
