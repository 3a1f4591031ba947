use gs_types::{GsResult, OptimizerSettings, SearchSpace, TrainingSet};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::adapters::{
    BackendAdapter, BranchAndFitAdapter, EvolutionaryAdapter, NormalizedAdapter,
    RandomSearchFallback, SurrogateModelAdapter,
};
use crate::backend::BackendKind;
use crate::padding::PaddingPolicy;

/// Builds a fresh, trained adapter for one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizerFactory {
    padding: PaddingPolicy,
}

impl OptimizerFactory {
    pub fn new(padding: PaddingPolicy) -> Self {
        Self { padding }
    }

    pub fn padding(&self) -> PaddingPolicy {
        self.padding
    }

    /// Resolve the backend, construct it and tell it `training` once.
    ///
    /// Two sub-seeds are drawn from `rng`, engine first and padding second.
    pub fn build(
        &self,
        space: &SearchSpace,
        settings: &OptimizerSettings,
        training: &TrainingSet,
        rng: &mut ChaCha8Rng,
    ) -> GsResult<NormalizedAdapter> {
        let kind = BackendKind::parse(&settings.base_estimator)?;
        let engine_seed: u64 = rng.gen();
        let padding_seed: u64 = rng.gen();

        let inner: Box<dyn BackendAdapter> = match &kind {
            BackendKind::Surrogate(regressor) => Box::new(SurrogateModelAdapter::new(
                space,
                settings,
                *regressor,
                engine_seed,
            )?),
            BackendKind::Evolutionary(algorithm) => Box::new(EvolutionaryAdapter::new(
                space,
                settings,
                algorithm,
                engine_seed,
            )?),
            BackendKind::BranchAndFit => {
                Box::new(BranchAndFitAdapter::new(space, settings, engine_seed)?)
            }
            BackendKind::Random => Box::new(RandomSearchFallback::new(space, engine_seed)),
        };

        let mut adapter = NormalizedAdapter::new(inner, space.clone(), self.padding, padding_seed);
        if !training.is_empty() {
            adapter.tell(&training.x, &training.y)?;
        }
        info!(
            backend = %adapter.name(),
            family = kind.family(),
            trained_on = training.len(),
            "optimizer ready"
        );
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterState;
    use gs_types::{GsError, Limits};
    use rand::SeedableRng;

    fn build(estimator: &str, training: &TrainingSet) -> GsResult<NormalizedAdapter> {
        let settings = OptimizerSettings::new(estimator)
            .with_parameter("x", 0.0, 1.0)
            .with_parameter("y", 0.0, 1.0);
        let space = SearchSpace::from_settings(&settings, &Limits::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        OptimizerFactory::default().build(&space, &settings, training, &mut rng)
    }

    fn training() -> TrainingSet {
        let mut t = TrainingSet::new();
        t.push(vec![0.2, 0.3], 1.0);
        t.push(vec![0.7, 0.1], 0.5);
        t
    }

    #[test]
    fn test_each_family_builds() {
        let cases = [
            ("SKOPT-GP", "SKOPT-GP"),
            ("gbrt", "SKOPT-GBRT"),
            ("NGOPT", "NEVERGRAD-OnePlusOne"),
            ("NEVERGRAD-TwoPointsDE", "NEVERGRAD-TwoPointsDE"),
            ("SNOBFIT", "SNOBFIT"),
            ("RANDOM", "RANDOM"),
        ];
        for (estimator, name) in cases {
            let adapter = build(estimator, &TrainingSet::new()).unwrap();
            assert_eq!(adapter.name(), name);
            assert_eq!(adapter.state(), AdapterState::Constructed);
        }
    }

    #[test]
    fn test_training_is_told_once() {
        for estimator in ["SKOPT-RF", "NG-DE", "SNOBFIT", "RANDOM"] {
            let adapter = build(estimator, &training()).unwrap();
            assert_eq!(adapter.state(), AdapterState::Trained, "{estimator}");
        }
    }

    #[test]
    fn test_unregistered_evolutionary_name() {
        match build("NEVERGRAD-CMA", &TrainingSet::new()) {
            Err(GsError::UnknownBackend { identifier }) => assert_eq!(identifier, "NEVERGRAD-CMA"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(adapter) => panic!("built {}", adapter.name()),
        }
    }
}
