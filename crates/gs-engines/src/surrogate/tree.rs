//! CART-style regression trees shared by the forest and boosting regressors.

use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// How a node chooses its split threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRule {
    /// Exhaustive search over sorted feature values.
    Best,
    /// One uniform threshold per candidate feature (extremely randomized trees).
    Random,
}

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub rule: SplitRule,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    /// Features considered per split; `None` means all of them.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
        variance: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Pending {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` selected by `samples` (duplicates
    /// allowed, which is how bootstrap resamples are passed in).
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            value: 0.0,
            variance: 0.0,
        }];
        let mut stack = vec![Pending {
            node: 0,
            samples,
            depth: 0,
        }];

        while let Some(Pending {
            node,
            samples,
            depth,
        }) = stack.pop()
        {
            let split = if params.max_depth.map_or(true, |m| depth < m) {
                find_split(x, y, &samples, params, rng)
            } else {
                None
            };

            match split {
                Some((feature, threshold)) => {
                    let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
                        samples.iter().copied().partition(|&i| x[i][feature] <= threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf {
                        value: 0.0,
                        variance: 0.0,
                    });
                    nodes.push(Node::Leaf {
                        value: 0.0,
                        variance: 0.0,
                    });
                    nodes[node] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };
                    stack.push(Pending {
                        node: right,
                        samples: right_samples,
                        depth: depth + 1,
                    });
                    stack.push(Pending {
                        node: left,
                        samples: left_samples,
                        depth: depth + 1,
                    });
                }
                None => {
                    let (value, variance) = leaf_stats(y, &samples);
                    nodes[node] = Node::Leaf { value, variance };
                }
            }
        }

        Self { nodes }
    }

    fn leaf_for(&self, point: &[f64]) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if point[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict(&self, point: &[f64]) -> f64 {
        self.predict_with_variance(point).0
    }

    /// Leaf mean and the within-leaf variance of the training targets.
    pub fn predict_with_variance(&self, point: &[f64]) -> (f64, f64) {
        match &self.nodes[self.leaf_for(point)] {
            Node::Leaf { value, variance } => (*value, *variance),
            Node::Split { .. } => (0.0, 0.0),
        }
    }

    /// Leaf id reached by `point`, stable for the lifetime of the tree.
    pub fn leaf_id(&self, point: &[f64]) -> usize {
        self.leaf_for(point)
    }

    /// Overwrite the value stored at a leaf (used by quantile boosting).
    pub fn set_leaf_value(&mut self, leaf: usize, new_value: f64) {
        if let Some(Node::Leaf { value, .. }) = self.nodes.get_mut(leaf) {
            *value = new_value;
        }
    }
}

fn leaf_stats(y: &[f64], samples: &[usize]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&i| y[i]).sum::<f64>() / n;
    let var = samples.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

/// Best `(feature, threshold)` by squared-error reduction, or `None` when no
/// admissible split exists.
fn find_split(
    x: &[Vec<f64>],
    y: &[f64],
    samples: &[usize],
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Option<(usize, f64)> {
    let min_leaf = params.min_samples_leaf.max(1);
    if samples.len() < 2 * min_leaf {
        return None;
    }
    let dims = x[samples[0]].len();
    if dims == 0 {
        return None;
    }

    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();
    let n = samples.len() as f64;
    let parent_sse = total_sq - total * total / n;
    if parent_sse <= 1e-14 {
        return None;
    }

    let n_features = params.max_features.unwrap_or(dims).clamp(1, dims);
    let features: Vec<usize> = if n_features == dims {
        (0..dims).collect()
    } else {
        index::sample(rng, dims, n_features).into_vec()
    };

    let mut best: Option<(usize, f64, f64)> = None;
    for feature in features {
        let candidate = match params.rule {
            SplitRule::Best => best_threshold(x, y, samples, feature, min_leaf),
            SplitRule::Random => random_threshold(x, y, samples, feature, min_leaf, rng),
        };
        if let Some((threshold, sse)) = candidate {
            if best.map_or(true, |(_, _, b)| sse < b) {
                best = Some((feature, threshold, sse));
            }
        }
    }

    best.filter(|&(_, _, sse)| sse < parent_sse)
        .map(|(f, t, _)| (f, t))
}

fn best_threshold(
    x: &[Vec<f64>],
    y: &[f64],
    samples: &[usize],
    feature: usize,
    min_leaf: usize,
) -> Option<(f64, f64)> {
    let mut order: Vec<usize> = samples.to_vec();
    order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

    let n = order.len();
    let total: f64 = order.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = order.iter().map(|&i| y[i] * y[i]).sum();

    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for k in 0..n - 1 {
        let yi = y[order[k]];
        left_sum += yi;
        left_sq += yi * yi;
        let left_n = k + 1;
        let right_n = n - left_n;
        if left_n < min_leaf || right_n < min_leaf {
            continue;
        }
        let here = x[order[k]][feature];
        let next = x[order[k + 1]][feature];
        if next <= here {
            continue;
        }
        let right_sum = total - left_sum;
        let right_sq = total_sq - left_sq;
        let sse = (left_sq - left_sum * left_sum / left_n as f64)
            + (right_sq - right_sum * right_sum / right_n as f64);
        if best.map_or(true, |(_, b)| sse < b) {
            best = Some((0.5 * (here + next), sse));
        }
    }
    best
}

fn random_threshold(
    x: &[Vec<f64>],
    y: &[f64],
    samples: &[usize],
    feature: usize,
    min_leaf: usize,
    rng: &mut ChaCha8Rng,
) -> Option<(f64, f64)> {
    let (lo, hi) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
        (lo.min(x[i][feature]), hi.max(x[i][feature]))
    });
    if hi <= lo {
        return None;
    }
    let threshold = rng.gen_range(lo..hi);

    let (mut ln, mut ls, mut lsq) = (0usize, 0.0, 0.0);
    let (mut rn, mut rs, mut rsq) = (0usize, 0.0, 0.0);
    for &i in samples {
        let yi = y[i];
        if x[i][feature] <= threshold {
            ln += 1;
            ls += yi;
            lsq += yi * yi;
        } else {
            rn += 1;
            rs += yi;
            rsq += yi * yi;
        }
    }
    if ln < min_leaf || rn < min_leaf {
        return None;
    }
    let sse = (lsq - ls * ls / ln as f64) + (rsq - rs * rs / rn as f64);
    Some((threshold, sse))
}
