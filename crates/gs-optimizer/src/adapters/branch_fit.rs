use gs_engines::{snobfit, SnobfitConfig};
use gs_types::{validation_error, GsResult, OptimizerSettings, SearchSpace};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::{check_tell, AdapterState, BackendAdapter};
use crate::padding::uniform_points;

const DEFAULT_P: f64 = 0.5;
const RESOLUTION: f64 = 1e-5;

/// SNOBFIT step over the told points.  Only the data is carried, the engine
/// rebuilds its partition on each call.
pub struct BranchAndFitAdapter {
    space: SearchSpace,
    p: f64,
    uncertainty: f64,
    seed: u64,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    state: AdapterState,
}

impl BranchAndFitAdapter {
    pub fn new(space: &SearchSpace, settings: &OptimizerSettings, seed: u64) -> GsResult<Self> {
        let p = settings.kwarg_f64("p")?.unwrap_or(DEFAULT_P);
        if !(0.0..=1.0).contains(&p) {
            return Err(validation_error!("acq_func_kwargs.p", "{p} is not a probability"));
        }
        let uncertainty = settings
            .kwarg_f64("uncertainty")?
            .unwrap_or_else(|| f64::EPSILON.sqrt());
        if uncertainty < 0.0 {
            return Err(validation_error!("acq_func_kwargs.uncertainty", "must not be negative"));
        }
        Ok(Self {
            space: space.clone(),
            p,
            uncertainty,
            seed,
            x: Vec::new(),
            y: Vec::new(),
            state: AdapterState::Constructed,
        })
    }

    fn resolution(&self) -> Vec<f64> {
        self.space
            .dimensions()
            .iter()
            .map(|d| d.width() * RESOLUTION)
            .collect()
    }
}

impl BackendAdapter for BranchAndFitAdapter {
    fn ask(&mut self, n: usize) -> GsResult<Vec<Vec<f64>>> {
        if self.x.is_empty() {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            let points = uniform_points(&self.space, n, &mut rng);
            info!(count = points.len(), "no data yet, random initial points");
            return Ok(points);
        }

        let config = SnobfitConfig {
            bounds: self.space.bounds(),
            nreq: n,
            p: self.p,
            seed: self.seed,
        };
        let f: Vec<(f64, f64)> = self.y.iter().map(|&v| (v, self.uncertainty)).collect();
        let output = snobfit(&self.x, &f, &config, &self.resolution())?;
        info!(
            count = output.request.len(),
            requested = n,
            f_best = output.f_best,
            classes = ?output.request.iter().map(|r| r.class.number()).collect::<Vec<u8>>(),
            "branch-and-fit step"
        );
        Ok(output.request.into_iter().map(|r| r.x).collect())
    }

    fn tell(&mut self, x: &[Vec<f64>], y: &[f64]) -> GsResult<()> {
        if !check_tell(&self.name(), self.space.len(), x, y)? {
            return Ok(());
        }
        self.x.extend_from_slice(x);
        self.y.extend_from_slice(y);
        self.state = AdapterState::Trained;
        Ok(())
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    fn name(&self) -> String {
        "SNOBFIT".to_string()
    }
}
