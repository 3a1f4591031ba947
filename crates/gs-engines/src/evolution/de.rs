//! Differential evolution, current-to-best/1 with uniform or two-point
//! crossover.

use gs_types::AlgorithmError;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{check_loss, Candidate, EvolutionaryOptimizer, Incumbent, Parametrization};
use crate::numeric::{reflect_unit, unit_point};

const F1: f64 = 0.8;
const F2: f64 = 0.8;
const CROSSOVER_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    Uniform,
    TwoPoints,
}

#[derive(Debug, Clone)]
struct Member {
    unit: Vec<f64>,
    loss: f64,
}

pub struct DifferentialEvolution {
    param: Parametrization,
    crossover: Crossover,
    budget: usize,
    population: Vec<Option<Member>>,
    incumbent: Incumbent,
    num_ask: usize,
    num_tell: usize,
    rng: ChaCha8Rng,
}

/// `max(30, 10 * dims)`, capped at 100.
pub fn population_size(dims: usize) -> usize {
    (10 * dims).max(30).min(100)
}

impl DifferentialEvolution {
    pub fn new(param: Parametrization, crossover: Crossover, budget: usize, seed: u64) -> Self {
        let size = population_size(param.dims());
        Self {
            param,
            crossover,
            budget,
            population: vec![None; size],
            incumbent: Incumbent::default(),
            num_ask: 0,
            num_tell: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn filled(&self) -> usize {
        self.population.iter().filter(|m| m.is_some()).count()
    }

    fn offspring(&mut self, slot: usize) -> Vec<f64> {
        let filled: Vec<usize> = (0..self.population.len())
            .filter(|&i| self.population[i].is_some())
            .collect();
        let (Some(current), Some(best)) = (self.population[slot].as_ref(), self.incumbent.point())
        else {
            return unit_point(&mut self.rng, self.param.dims());
        };
        if filled.len() < 3 {
            return unit_point(&mut self.rng, self.param.dims());
        }

        let picks = index::sample(&mut self.rng, filled.len(), 2);
        let (a, b) = match (
            self.population[filled[picks.index(0)]].as_ref(),
            self.population[filled[picks.index(1)]].as_ref(),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return unit_point(&mut self.rng, self.param.dims()),
        };

        let donor: Vec<f64> = (0..current.unit.len())
            .map(|k| {
                current.unit[k] + F2 * (best[k] - current.unit[k]) + F1 * (a.unit[k] - b.unit[k])
            })
            .collect();

        let dims = donor.len();
        let mut child = current.unit.clone();
        match self.crossover {
            Crossover::Uniform => {
                let forced = self.rng.gen_range(0..dims);
                for k in 0..dims {
                    if k == forced || self.rng.gen::<f64>() < CROSSOVER_RATE {
                        child[k] = donor[k];
                    }
                }
            }
            Crossover::TwoPoints => {
                let start = self.rng.gen_range(0..dims);
                let end = self.rng.gen_range(start + 1..=dims);
                child[start..end].copy_from_slice(&donor[start..end]);
            }
        }
        child.into_iter().map(reflect_unit).collect()
    }

    fn worst_slot(&self) -> Option<usize> {
        let mut worst: Option<(usize, f64)> = None;
        for (i, member) in self.population.iter().enumerate() {
            if let Some(m) = member {
                if worst.map_or(true, |(_, w)| m.loss > w) {
                    worst = Some((i, m.loss));
                }
            }
        }
        worst.map(|(i, _)| i)
    }
}

impl EvolutionaryOptimizer for DifferentialEvolution {
    fn ask(&mut self) -> Candidate {
        let slot = self.num_ask % self.population.len();
        self.num_ask += 1;
        let unit = self.offspring(slot);
        self.param.candidate(&unit, slot)
    }

    fn tell(&mut self, candidate: &Candidate, loss: f64) -> Result<(), AlgorithmError> {
        check_loss(self.name(), loss)?;
        let unit = self.param.to_unit(&candidate.value)?;
        self.incumbent.offer(&unit, loss);

        let target = match candidate.parent() {
            Some(slot) if slot < self.population.len() => Some(slot),
            _ => self
                .population
                .iter()
                .position(|m| m.is_none())
                .or_else(|| self.worst_slot()),
        };
        if let Some(slot) = target {
            let replace = match &self.population[slot] {
                None => true,
                Some(m) => loss < m.loss,
            };
            if replace {
                self.population[slot] = Some(Member { unit, loss });
            }
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
        match self.crossover {
            Crossover::Uniform => "DE",
            Crossover::TwoPoints => "TwoPointsDE",
        }
    }

    fn recommend(&self) -> Option<(Vec<f64>, f64)> {
        self.incumbent.recommend(&self.param)
    }
}
