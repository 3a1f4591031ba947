//! Uniform random search behind the evolutionary interface.

use gs_types::AlgorithmError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{check_loss, Candidate, EvolutionaryOptimizer, Incumbent, Parametrization};
use crate::numeric::unit_point;

pub struct RandomSearch {
    param: Parametrization,
    budget: usize,
    incumbent: Incumbent,
    num_ask: usize,
    num_tell: usize,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(param: Parametrization, budget: usize, seed: u64) -> Self {
        Self {
            param,
            budget,
            incumbent: Incumbent::default(),
            num_ask: 0,
            num_tell: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl EvolutionaryOptimizer for RandomSearch {
    fn ask(&mut self) -> Candidate {
        let id = self.num_ask;
        self.num_ask += 1;
        let unit = unit_point(&mut self.rng, self.param.dims());
        self.param.candidate(&unit, id)
    }

    fn tell(&mut self, candidate: &Candidate, loss: f64) -> Result<(), AlgorithmError> {
        check_loss(self.name(), loss)?;
        let unit = self.param.to_unit(&candidate.value)?;
        self.incumbent.offer(&unit, loss);
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
        "RandomSearch"
    }

    fn recommend(&self) -> Option<(Vec<f64>, f64)> {
        self.incumbent.recommend(&self.param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asks_stay_in_bounds_and_best_is_kept() {
        let param = Parametrization::new(&[(3.0, 4.0), (-1.0, 1.0)]).unwrap();
        let mut rs = RandomSearch::new(param, 50, 2);
        for i in 0..50 {
            let c = rs.ask();
            assert!((3.0..=4.0).contains(&c.value[0]));
            assert!((-1.0..=1.0).contains(&c.value[1]));
            rs.tell(&c, (50 - i) as f64).unwrap();
        }
        let (_, best) = rs.recommend().unwrap();
        assert_eq!(best, 1.0);
        assert_eq!(rs.num_ask(), 50);
    }
}
