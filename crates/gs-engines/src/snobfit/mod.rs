//! Branch-and-fit optimization for noisy, expensive objectives.
//!
//! A simplified SNOBFIT step: the evaluated points are merged at resolution
//! `dx`, the box is partitioned so every point owns one cell, a local linear
//! model is fitted around each point, and new evaluation requests are drawn
//! from five classes:
//!
//! 1. a model step from the best point,
//! 2. model steps from other local minima,
//! 3. model steps from the remaining points,
//! 4. points in the largest cells (exploration, chosen with probability `p`),
//! 5. space-filling points while there are too few data for local models.
//!
//! Requests closer than `dx` to an evaluated or already requested point are
//! dropped, so a call may return fewer than `nreq` requests.

pub mod local;
pub mod partition;

use std::collections::VecDeque;

use gs_types::AlgorithmError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::numeric::{argmin, unit_point};
use local::LocalModel;
use partition::{within, Cell};

const FILL_CANDIDATES: usize = 50;

#[derive(Debug, Clone)]
pub struct SnobfitConfig {
    pub bounds: Vec<(f64, f64)>,
    /// Number of requested points.
    pub nreq: usize,
    /// Probability of drawing a class 4 (large cell) request.
    pub p: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestClass {
    BestStep = 1,
    LocalMinimum = 2,
    Point = 3,
    LargeCell = 4,
    Fill = 5,
}

impl RequestClass {
    pub fn number(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub x: Vec<f64>,
    pub f_estimate: f64,
    pub class: RequestClass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnobfitOutput {
    pub request: Vec<Request>,
    pub x_best: Vec<f64>,
    pub f_best: f64,
}

/// One branch-and-fit step.  `f` holds `(value, uncertainty)` pairs and `dx`
/// the per-coordinate resolution in the units of `x`.
pub fn snobfit(
    x: &[Vec<f64>],
    f: &[(f64, f64)],
    config: &SnobfitConfig,
    dx: &[f64],
) -> Result<SnobfitOutput, AlgorithmError> {
    let dims = config.bounds.len();
    validate(x, f, config, dx)?;

    let widths: Vec<f64> = config.bounds.iter().map(|(lo, hi)| hi - lo).collect();
    let unit: Vec<Vec<f64>> = x
        .iter()
        .map(|p| {
            p.iter()
                .zip(&config.bounds)
                .map(|(v, (lo, hi))| ((v - lo) / (hi - lo)).clamp(0.0, 1.0))
                .collect()
        })
        .collect();
    let dx_unit: Vec<f64> = dx
        .iter()
        .zip(&widths)
        .map(|(d, w)| (d / w).max(1e-12))
        .collect();
    let values: Vec<f64> = f.iter().map(|v| v.0).collect();

    let best = argmin(&values)
        .ok_or_else(|| AlgorithmError::invalid_input("snobfit", "no finite objective values"))?;
    let x_best = x[best].clone();
    let f_best = values[best];

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let kept = partition::merge(&unit, &values, &dx_unit);
    let mut dedup = Dedup {
        taken: unit.clone(),
        dx: dx_unit,
    };

    let requests = if config.nreq == 0 {
        Vec::new()
    } else if kept.len() < dims + 1 {
        fill(&unit, &values, config.nreq, dims, &mut dedup, &mut rng)
    } else {
        branch_and_fit(&unit, f, &kept, config, &mut dedup, &mut rng)
    };

    debug!(
        points = x.len(),
        merged = kept.len(),
        requested = config.nreq,
        produced = requests.len(),
        "snobfit step"
    );

    let request = requests
        .into_iter()
        .map(|r| Request {
            x: r
                .x
                .iter()
                .zip(&config.bounds)
                .map(|(u, (lo, hi))| lo + u * (hi - lo))
                .collect(),
            ..r
        })
        .collect();

    Ok(SnobfitOutput {
        request,
        x_best,
        f_best,
    })
}

fn validate(
    x: &[Vec<f64>],
    f: &[(f64, f64)],
    config: &SnobfitConfig,
    dx: &[f64],
) -> Result<(), AlgorithmError> {
    let dims = config.bounds.len();
    if x.is_empty() {
        return Err(AlgorithmError::invalid_input("snobfit", "no evaluated points"));
    }
    if x.len() != f.len() {
        return Err(AlgorithmError::invalid_input(
            "snobfit",
            format!("{} points but {} values", x.len(), f.len()),
        ));
    }
    if dims == 0 || dx.len() != dims {
        return Err(AlgorithmError::invalid_input(
            "snobfit",
            format!("{dims} bounds but {} resolutions", dx.len()),
        ));
    }
    if config
        .bounds
        .iter()
        .any(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo < hi))
    {
        return Err(AlgorithmError::invalid_input("snobfit", "empty or non-finite bounds"));
    }
    if let Some(i) = x.iter().position(|p| p.len() != dims) {
        return Err(AlgorithmError::invalid_input(
            "snobfit",
            format!("point {i} has {} coordinates, expected {dims}", x[i].len()),
        ));
    }
    if let Some(i) = f
        .iter()
        .position(|(v, u)| !v.is_finite() || !u.is_finite() || *u < 0.0)
    {
        return Err(AlgorithmError::invalid_input(
            "snobfit",
            format!("value {i} is not finite or has a negative uncertainty"),
        ));
    }
    if !(0.0..=1.0).contains(&config.p) {
        return Err(AlgorithmError::invalid_input(
            "snobfit",
            format!("p = {} outside [0, 1]", config.p),
        ));
    }
    Ok(())
}

/// Points already evaluated or requested, in unit coordinates.
struct Dedup {
    taken: Vec<Vec<f64>>,
    dx: Vec<f64>,
}

impl Dedup {
    fn accept(&mut self, point: &[f64]) -> bool {
        if self.taken.iter().any(|t| within(t, point, &self.dx)) {
            return false;
        }
        self.taken.push(point.to_vec());
        true
    }

    fn min_distance(&self, point: &[f64]) -> f64 {
        self.taken
            .iter()
            .map(|t| {
                t.iter()
                    .zip(point)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
            })
            .fold(f64::INFINITY, f64::min)
    }
}

/// Class 5: best-of-`FILL_CANDIDATES` maximin points.
fn fill(
    unit: &[Vec<f64>],
    values: &[f64],
    nreq: usize,
    dims: usize,
    dedup: &mut Dedup,
    rng: &mut ChaCha8Rng,
) -> Vec<Request> {
    let mut out = Vec::with_capacity(nreq);
    for _ in 0..nreq {
        let candidate = (0..FILL_CANDIDATES)
            .map(|_| unit_point(rng, dims))
            .map(|c| (dedup.min_distance(&c), c))
            .fold(None::<(f64, Vec<f64>)>, |best, (d, c)| match best {
                Some((bd, _)) if bd >= d => best,
                _ => Some((d, c)),
            });
        let Some((_, point)) = candidate else { break };
        if !dedup.accept(&point) {
            continue;
        }
        // value of the nearest evaluated point stands in for an estimate
        let nearest = unit
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let d: f64 = p.iter().zip(&point).map(|(a, b)| (a - b).powi(2)).sum();
                (d, i)
            })
            .fold((f64::INFINITY, 0), |acc, cur| if cur.0 < acc.0 { cur } else { acc })
            .1;
        out.push(Request {
            x: point,
            f_estimate: values[nearest],
            class: RequestClass::Fill,
        });
    }
    out
}

struct Step {
    x: Vec<f64>,
    f_estimate: f64,
}

/// Move against the local gradient by half the cell width per coordinate.
fn model_step(origin: &[f64], f_origin: f64, model: &LocalModel, cell: &Cell) -> Step {
    let scale = model
        .gradient
        .iter()
        .fold(0.0_f64, |m, g| m.max(g.abs()));
    let x: Vec<f64> = if scale < 1e-14 {
        cell.centre()
    } else {
        origin
            .iter()
            .zip(&model.gradient)
            .zip(cell.widths())
            .map(|((o, g), w)| (o - 0.5 * w * g / scale).clamp(0.0, 1.0))
            .collect()
    };
    let f_estimate = model.predict(origin, f_origin, &x);
    Step { x, f_estimate }
}

/// Class 4 point of a cell: its centre, or halfway to the far corner when the
/// centre coincides with the cell's own point.
fn cell_probe(origin: &[f64], cell: &Cell, dx: &[f64]) -> Vec<f64> {
    let centre = cell.centre();
    if !within(&centre, origin, dx) {
        return centre;
    }
    origin
        .iter()
        .zip(cell.low.iter().zip(&cell.high))
        .map(|(o, (l, h))| {
            let far = if o - l > h - o { *l } else { *h };
            0.5 * (o + far)
        })
        .collect()
}

fn branch_and_fit(
    unit: &[Vec<f64>],
    f: &[(f64, f64)],
    kept: &[usize],
    config: &SnobfitConfig,
    dedup: &mut Dedup,
    rng: &mut ChaCha8Rng,
) -> Vec<Request> {
    let dims = config.bounds.len();
    let cells = partition::partition(unit, kept, dims);
    let models: Vec<LocalModel> = cells
        .iter()
        .map(|cell| {
            let neighbours = local::nearest(unit, kept, cell.point, dims + 5);
            local::fit(unit, f, cell.point, neighbours)
        })
        .collect();

    let value = |c: usize| f[cells[c].point].0;
    let mut by_value: Vec<usize> = (0..cells.len()).collect();
    by_value.sort_by(|&a, &b| value(a).total_cmp(&value(b)).then(a.cmp(&b)));
    let best = by_value[0];

    let is_local_min = |c: usize| {
        models[c]
            .neighbours
            .iter()
            .all(|&j| f[cells[c].point].0 <= f[j].0)
    };
    let (minima, rest): (Vec<usize>, Vec<usize>) =
        by_value[1..].iter().copied().partition(|&c| is_local_min(c));

    let mut by_size: Vec<usize> = (0..cells.len()).collect();
    by_size.sort_by(|&a, &b| {
        cells[b]
            .volume()
            .total_cmp(&cells[a].volume())
            .then(a.cmp(&b))
    });

    let step = |c: usize| {
        let cell = &cells[c];
        model_step(&unit[cell.point], f[cell.point].0, &models[c], cell)
    };
    let probe = |c: usize| {
        let cell = &cells[c];
        let x = cell_probe(&unit[cell.point], cell, &dedup.dx);
        let f_estimate = models[c].predict(&unit[cell.point], f[cell.point].0, &x);
        Step { x, f_estimate }
    };

    let mut local_queue: VecDeque<(usize, RequestClass)> = minima
        .into_iter()
        .map(|c| (c, RequestClass::LocalMinimum))
        .chain(rest.into_iter().map(|c| (c, RequestClass::Point)))
        .collect();
    let mut probes: VecDeque<Step> = by_size.into_iter().map(probe).collect();

    let mut out = Vec::with_capacity(config.nreq);
    let first = step(best);
    if dedup.accept(&first.x) {
        out.push(Request {
            x: first.x,
            f_estimate: first.f_estimate,
            class: RequestClass::BestStep,
        });
    }

    while out.len() < config.nreq {
        let explore = match (local_queue.is_empty(), probes.is_empty()) {
            (true, true) => break,
            (true, false) => true,
            (false, true) => false,
            (false, false) => rng.gen::<f64>() < config.p,
        };
        let (candidate, class) = if explore {
            match probes.pop_front() {
                Some(s) => (s, RequestClass::LargeCell),
                None => break,
            }
        } else {
            match local_queue.pop_front() {
                Some((c, class)) => (step(c), class),
                None => break,
            }
        };
        if dedup.accept(&candidate.x) {
            out.push(Request {
                x: candidate.x,
                f_estimate: candidate.f_estimate,
                class,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bowl(p: &[f64]) -> f64 {
        (p[0] - 0.3).powi(2) + (p[1] + 0.2).powi(2)
    }

    fn scattered(n: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)])
            .collect()
    }

    fn config(nreq: usize, seed: u64) -> SnobfitConfig {
        SnobfitConfig {
            bounds: vec![(-1.0, 1.0), (-1.0, 1.0)],
            nreq,
            p: 0.5,
            seed,
        }
    }

    const DX: [f64; 2] = [2e-5, 2e-5];

    #[test]
    fn test_requests_are_bounded_and_new() {
        let x = scattered(20, 1);
        let f: Vec<(f64, f64)> = x.iter().map(|p| (bowl(p), 1e-8)).collect();
        let out = snobfit(&x, &f, &config(6, 3), &DX).unwrap();

        assert!(!out.request.is_empty());
        assert!(out.request.len() <= 6);
        assert_eq!(out.request[0].class, RequestClass::BestStep);
        for r in &out.request {
            assert!(r.x.iter().all(|v| (-1.0..=1.0).contains(v)), "{:?}", r.x);
            assert!(x.iter().all(|p| !within(p, &r.x, &DX)));
            assert!(r.f_estimate.is_finite());
        }
        let expected_best = f.iter().map(|v| v.0).fold(f64::INFINITY, f64::min);
        assert_eq!(out.f_best, expected_best);
    }

    #[test]
    fn test_best_step_moves_downhill() {
        let x = scattered(30, 8);
        let f: Vec<(f64, f64)> = x.iter().map(|p| (bowl(p), 0.0)).collect();
        let out = snobfit(&x, &f, &config(1, 0), &DX).unwrap();
        let first = &out.request[0];
        assert!(first.f_estimate <= out.f_best + 1e-9);
    }

    #[test]
    fn test_same_seed_same_requests() {
        let x = scattered(15, 4);
        let f: Vec<(f64, f64)> = x.iter().map(|p| (bowl(p), 1e-8)).collect();
        let a = snobfit(&x, &f, &config(5, 9), &DX).unwrap();
        let b = snobfit(&x, &f, &config(5, 9), &DX).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_points_fill_space() {
        let x = vec![vec![0.0, 0.0]];
        let f = vec![(1.0, 0.0)];
        let out = snobfit(&x, &f, &config(4, 2), &DX).unwrap();
        assert_eq!(out.request.len(), 4);
        assert!(out.request.iter().all(|r| r.class == RequestClass::Fill));
        assert_eq!(out.x_best, vec![0.0, 0.0]);
    }

    #[test]
    fn test_duplicates_are_merged_before_partition() {
        let mut x = scattered(10, 5);
        x.push(x[0].clone());
        let f: Vec<(f64, f64)> = x.iter().map(|p| (bowl(p), 0.0)).collect();
        let out = snobfit(&x, &f, &config(3, 1), &DX).unwrap();
        assert!(out.request.len() <= 3);
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let cfg = config(2, 0);
        assert!(matches!(
            snobfit(&[], &[], &cfg, &DX),
            Err(AlgorithmError::InvalidInput { .. })
        ));
        assert!(snobfit(&[vec![0.0, 0.0]], &[(f64::NAN, 0.0)], &cfg, &DX).is_err());
        assert!(snobfit(&[vec![0.0]], &[(1.0, 0.0)], &cfg, &DX).is_err());
        assert!(snobfit(&[vec![0.0, 0.0]], &[(1.0, 0.0)], &cfg, &[1e-5]).is_err());
    }
}
