//! A uniform ask/tell surface over every engine family.
//!
//! Adapters are built fresh for each request from the search space and the
//! training set, told once, asked once and dropped.  [`NormalizedAdapter`]
//! wraps all of them so that callers always receive exactly the number of
//! in-bounds points they asked for.

mod branch_fit;
mod evolutionary;
mod random;
mod surrogate;

pub use branch_fit::BranchAndFitAdapter;
pub use evolutionary::EvolutionaryAdapter;
pub use random::RandomSearchFallback;
pub use surrogate::SurrogateModelAdapter;

use gs_types::{AlgorithmError, GsResult, SearchSpace, ValidationError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::padding::PaddingPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdapterState {
    Constructed,
    /// At least one successful `tell`.
    Trained,
}

pub trait BackendAdapter: Send {
    fn ask(&mut self, n: usize) -> GsResult<Vec<Vec<f64>>>;

    fn tell(&mut self, x: &[Vec<f64>], y: &[f64]) -> GsResult<()>;

    fn state(&self) -> AdapterState;

    fn name(&self) -> String;
}

/// Shared argument checks for `tell`.  `Ok(false)` means there is nothing to
/// record.
pub(crate) fn check_tell(name: &str, dims: usize, x: &[Vec<f64>], y: &[f64]) -> GsResult<bool> {
    if x.len() != y.len() {
        return Err(ValidationError::new(
            "existing_data",
            format!("{} points but {} objective values", x.len(), y.len()),
        )
        .into());
    }
    if let Some(i) = x.iter().position(|p| p.len() != dims) {
        return Err(ValidationError::new(
            format!("existing_data[{i}]"),
            format!("expected {dims} coordinates, got {}", x[i].len()),
        )
        .into());
    }
    if x.is_empty() {
        debug!(backend = name, "tell with no data, nothing to do");
        return Ok(false);
    }
    Ok(true)
}

pub struct NormalizedAdapter {
    inner: Box<dyn BackendAdapter>,
    space: SearchSpace,
    padding: PaddingPolicy,
    rng: ChaCha8Rng,
}

impl NormalizedAdapter {
    pub fn new(
        inner: Box<dyn BackendAdapter>,
        space: SearchSpace,
        padding: PaddingPolicy,
        seed: u64,
    ) -> Self {
        Self {
            inner,
            space,
            padding,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl BackendAdapter for NormalizedAdapter {
    fn ask(&mut self, n: usize) -> GsResult<Vec<Vec<f64>>> {
        if n == 0 {
            return Err(ValidationError::new("n", "must ask for at least one point").into());
        }

        let mut points = self.inner.ask(n)?;
        let dims = self.space.len();
        for point in &points {
            if point.len() != dims {
                return Err(AlgorithmError::invalid_input(
                    self.inner.name(),
                    format!("proposed {} coordinates for {dims} dimensions", point.len()),
                )
                .into());
            }
            if point.iter().any(|v| !v.is_finite()) {
                return Err(AlgorithmError::numerical(
                    self.inner.name(),
                    "proposed a non-finite coordinate",
                )
                .into());
            }
        }

        if points.len() > n {
            debug!(backend = %self.inner.name(), returned = points.len(), requested = n, "truncating batch");
            points.truncate(n);
        } else if points.len() < n {
            let missing = n - points.len();
            warn!(
                backend = %self.inner.name(),
                returned = points.len(),
                requested = n,
                policy = ?self.padding,
                "padding short batch"
            );
            points.extend(self.padding.sample(&self.space, missing, &mut self.rng));
        }

        for point in &mut points {
            self.space.clamp(point);
        }
        Ok(points)
    }

    fn tell(&mut self, x: &[Vec<f64>], y: &[f64]) -> GsResult<()> {
        self.inner.tell(x, y)
    }

    fn state(&self) -> AdapterState {
        self.inner.state()
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}
