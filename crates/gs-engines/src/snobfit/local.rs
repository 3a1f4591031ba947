//! Local linear models fitted around each point from its nearest neighbours.

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct LocalModel {
    pub gradient: Vec<f64>,
    pub neighbours: Vec<usize>,
}

impl LocalModel {
    /// Linear prediction at `at` anchored on `(origin, f_origin)`.
    pub fn predict(&self, origin: &[f64], f_origin: f64, at: &[f64]) -> f64 {
        f_origin
            + self
                .gradient
                .iter()
                .zip(at.iter().zip(origin))
                .map(|(g, (a, o))| g * (a - o))
                .sum::<f64>()
    }
}

fn distance_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// The `k` nearest other points to `i`, closest first, ties by index.
pub fn nearest(x: &[Vec<f64>], points: &[usize], i: usize, k: usize) -> Vec<usize> {
    let mut others: Vec<(f64, usize)> = points
        .iter()
        .filter(|&&j| j != i)
        .map(|&j| (distance_sq(&x[i], &x[j]), j))
        .collect();
    others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    others.into_iter().take(k).map(|(_, j)| j).collect()
}

/// Weighted least-squares gradient of `f` around point `i`.
///
/// Each neighbour contributes one row `(x_j - x_i) . g = f_j - f_i`, scaled
/// down by its distance and by the combined uncertainty of both values.
pub fn fit(x: &[Vec<f64>], f: &[(f64, f64)], i: usize, neighbours: Vec<usize>) -> LocalModel {
    let dims = x[i].len();
    if neighbours.is_empty() {
        return LocalModel {
            gradient: vec![0.0; dims],
            neighbours,
        };
    }

    let rows = neighbours.len();
    let mut a = DMatrix::<f64>::zeros(rows, dims);
    let mut b = DVector::<f64>::zeros(rows);
    for (r, &j) in neighbours.iter().enumerate() {
        let dist = distance_sq(&x[i], &x[j]).sqrt();
        let weight = 1.0 / (dist + f[i].1 + f[j].1 + 1e-12);
        for k in 0..dims {
            a[(r, k)] = weight * (x[j][k] - x[i][k]);
        }
        b[r] = weight * (f[j].0 - f[i].0);
    }

    let gradient = a
        .svd(true, true)
        .solve(&b, 1e-12)
        .map(|g| g.iter().copied().collect::<Vec<f64>>())
        .ok()
        .filter(|g| g.iter().all(|v| v.is_finite()))
        .unwrap_or_else(|| vec![0.0; dims]);

    LocalModel {
        gradient,
        neighbours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_linear_gradient() {
        let x: Vec<Vec<f64>> = vec![
            vec![0.5, 0.5],
            vec![0.6, 0.5],
            vec![0.5, 0.7],
            vec![0.3, 0.4],
            vec![0.8, 0.9],
        ];
        let f: Vec<(f64, f64)> = x.iter().map(|p| (2.0 * p[0] - 3.0 * p[1], 0.0)).collect();
        let points: Vec<usize> = (0..x.len()).collect();
        let nb = nearest(&x, &points, 0, 4);
        assert_eq!(nb[0], 1);
        let model = fit(&x, &f, 0, nb);
        assert!((model.gradient[0] - 2.0).abs() < 1e-8);
        assert!((model.gradient[1] + 3.0).abs() < 1e-8);
        let pred = model.predict(&x[0], f[0].0, &[1.0, 1.0]);
        assert!((pred + 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_lone_point_has_flat_model() {
        let model = fit(&[vec![0.2, 0.2]], &[(1.0, 0.0)], 0, vec![]);
        assert_eq!(model.gradient, vec![0.0, 0.0]);
    }
}
