//! (1+1) evolution strategy with one-fifth-rule step adaptation.

use gs_types::AlgorithmError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{check_loss, Candidate, EvolutionaryOptimizer, Incumbent, Parametrization};
use crate::numeric::{reflect_unit, standard_normal};

const INITIAL_SIGMA: f64 = 0.25;
const SUCCESS_FACTOR: f64 = 2.0;
const FAILURE_FACTOR: f64 = 0.84;
const MIN_SIGMA: f64 = 1e-8;
const MAX_SIGMA: f64 = 1.0;

pub struct OnePlusOne {
    param: Parametrization,
    budget: usize,
    sigma: f64,
    incumbent: Incumbent,
    num_ask: usize,
    num_tell: usize,
    rng: ChaCha8Rng,
}

impl OnePlusOne {
    pub fn new(param: Parametrization, budget: usize, seed: u64) -> Self {
        Self {
            param,
            budget,
            sigma: INITIAL_SIGMA,
            incumbent: Incumbent::default(),
            num_ask: 0,
            num_tell: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl EvolutionaryOptimizer for OnePlusOne {
    fn ask(&mut self) -> Candidate {
        let id = self.num_ask;
        self.num_ask += 1;
        let centre = vec![0.5; self.param.dims()];
        let parent = match self.incumbent.point() {
            Some(parent) => parent.to_vec(),
            // the centre itself only once, later asks mutate around it
            None if id == 0 => return self.param.candidate(&centre, id),
            None => centre,
        };
        let unit: Vec<f64> = parent
            .iter()
            .map(|&p| reflect_unit(p + self.sigma * standard_normal(&mut self.rng)))
            .collect();
        self.param.candidate(&unit, id)
    }

    fn tell(&mut self, candidate: &Candidate, loss: f64) -> Result<(), AlgorithmError> {
        check_loss(self.name(), loss)?;
        let unit = self.param.to_unit(&candidate.value)?;
        let first = self.incumbent.point().is_none();
        let improved = self.incumbent.offer(&unit, loss);
        if !first {
            self.sigma = if improved {
                self.sigma * SUCCESS_FACTOR
            } else {
                self.sigma * FAILURE_FACTOR
            }
            .clamp(MIN_SIGMA, MAX_SIGMA);
        }
        self.num_tell += 1;
        Ok(())
    }

    fn num_ask(&self) -> usize {
        self.num_ask
    }

    fn num_tell(&self) -> usize {
        self.num_tell
    }

    fn budget(&self) -> usize {
        self.budget
    }

    fn name(&self) -> &'static str {
        "OnePlusOne"
    }

    fn recommend(&self) -> Option<(Vec<f64>, f64)> {
        self.incumbent.recommend(&self.param)
    }
}
