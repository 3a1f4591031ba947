//! # gs-engines
//!
//! Optimization engines behind the gsopt orchestrator, each with its own
//! native ask/tell surface:
//!
//! - [`surrogate`]: Bayesian optimization over GP, random-forest,
//!   extra-trees and gradient-boosted surrogates.
//! - [`evolution`]: candidate-based evolutionary optimizers looked up by
//!   name through [`evolution::registry`].
//! - [`snobfit`]: a single-call branch-and-fit step for noisy objectives.

pub mod evolution;
pub mod numeric;
pub mod snobfit;
pub mod surrogate;

pub use evolution::{Candidate, EvolutionaryOptimizer, Parametrization};
pub use snobfit::{snobfit, Request, RequestClass, SnobfitConfig, SnobfitOutput};
pub use surrogate::{
    AcqOptimizerKind, AcquisitionKind, Regressor, RegressorKind, SurrogateConfig,
    SurrogateOptimizer,
};
