use gs_types::{GsResult, SearchSpace};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{check_tell, AdapterState, BackendAdapter};
use crate::padding::uniform_points;

/// Uniform sampling that ignores history.
pub struct RandomSearchFallback {
    space: SearchSpace,
    rng: ChaCha8Rng,
    state: AdapterState,
}

impl RandomSearchFallback {
    pub fn new(space: &SearchSpace, seed: u64) -> Self {
        Self {
            space: space.clone(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            state: AdapterState::Constructed,
        }
    }
}

impl BackendAdapter for RandomSearchFallback {
    fn ask(&mut self, n: usize) -> GsResult<Vec<Vec<f64>>> {
        Ok(uniform_points(&self.space, n, &mut self.rng))
    }

    fn tell(&mut self, x: &[Vec<f64>], y: &[f64]) -> GsResult<()> {
        if check_tell(&self.name(), self.space.len(), x, y)? {
            debug!(ignored = x.len(), "random search does not train");
            self.state = AdapterState::Trained;
        }
        Ok(())
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    fn name(&self) -> String {
        "RANDOM".to_string()
    }
}
