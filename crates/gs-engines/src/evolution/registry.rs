//! Name-based construction of evolutionary optimizers.

use super::de::{Crossover, DifferentialEvolution};
use super::one_plus_one::OnePlusOne;
use super::random::RandomSearch;
use super::{EvolutionaryOptimizer, Parametrization};

/// Registered names, matched exactly.
pub const NAMES: [&str; 4] = ["OnePlusOne", "DE", "TwoPointsDE", "RandomSearch"];

pub const DEFAULT: &str = "OnePlusOne";

/// `None` when `name` is not registered.
pub fn create(
    name: &str,
    param: Parametrization,
    budget: usize,
    seed: u64,
) -> Option<Box<dyn EvolutionaryOptimizer>> {
    let opt: Box<dyn EvolutionaryOptimizer> = match name {
        "OnePlusOne" => Box::new(OnePlusOne::new(param, budget, seed)),
        "DE" => Box::new(DifferentialEvolution::new(param, Crossover::Uniform, budget, seed)),
        "TwoPointsDE" => Box::new(DifferentialEvolution::new(
            param,
            Crossover::TwoPoints,
            budget,
            seed,
        )),
        "RandomSearch" => Box::new(RandomSearch::new(param, budget, seed)),
        _ => return None,
    };
    Some(opt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_name_builds() {
        let param = Parametrization::new(&[(0.0, 1.0), (0.0, 1.0)]).unwrap();
        for name in NAMES {
            let opt = create(name, param.clone(), 100, 0).unwrap();
            assert_eq!(opt.name(), name);
            assert_eq!(opt.budget(), 100);
        }
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let param = Parametrization::new(&[(0.0, 1.0)]).unwrap();
        assert!(create("oneplusone", param.clone(), 10, 0).is_none());
        assert!(create("CMA", param, 10, 0).is_none());
        assert!(NAMES.contains(&DEFAULT));
        assert!(!NAMES.contains(&"de"));
    }
}
