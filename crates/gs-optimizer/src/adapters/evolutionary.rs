use gs_engines::evolution::{registry, EvolutionaryOptimizer, Parametrization};
use gs_types::{
    validation_error, AlgorithmError, GsError, GsResult, OptimizerSettings, SearchSpace,
};
use tracing::{debug, warn};

use super::{check_tell, AdapterState, BackendAdapter};

const DEFAULT_BUDGET: usize = 1000;

/// Population-based search rebuilt from history on every `ask`.
///
/// The engines keep state that cannot be serialized, so `tell` only records
/// the data.  `ask` constructs a fresh engine, replays every recorded point
/// in arrival order and checks that the engine consumed all of them before
/// asking it for new candidates.
pub struct EvolutionaryAdapter {
    param: Parametrization,
    algorithm: &'static str,
    budget: usize,
    seed: u64,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    state: AdapterState,
}

impl EvolutionaryAdapter {
    pub fn new(
        space: &SearchSpace,
        settings: &OptimizerSettings,
        algorithm: &str,
        seed: u64,
    ) -> GsResult<Self> {
        let algorithm = registry::NAMES
            .iter()
            .copied()
            .find(|name| *name == algorithm)
            .ok_or_else(|| GsError::unknown_backend(settings.base_estimator.as_str()))?;

        let budget = match settings.kwarg_usize("budget")? {
            Some(0) => return Err(validation_error!("acq_func_kwargs.budget", "must be at least 1")),
            Some(b) => b,
            None => DEFAULT_BUDGET,
        };

        Ok(Self {
            param: Parametrization::new(&space.bounds())?,
            algorithm,
            budget,
            seed,
            x: Vec::new(),
            y: Vec::new(),
            state: AdapterState::Constructed,
        })
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// A fresh engine with the recorded history told to it.
    pub fn replay(&self) -> GsResult<Box<dyn EvolutionaryOptimizer>> {
        let mut engine = registry::create(self.algorithm, self.param.clone(), self.budget, self.seed)
            .ok_or_else(|| GsError::unknown_backend(self.algorithm))?;

        for (point, &loss) in self.x.iter().zip(&self.y) {
            let candidate = self.param.spawn_child(point.clone());
            engine.tell(&candidate, loss)?;
        }

        if engine.num_tell() != self.y.len() {
            return Err(AlgorithmError::ReplayMismatch {
                engine: engine.name().to_string(),
                consumed: engine.num_tell(),
                expected: self.y.len(),
            }
            .into());
        }
        debug!(engine = engine.name(), replayed = self.y.len(), "history replayed");
        Ok(engine)
    }
}

impl BackendAdapter for EvolutionaryAdapter {
    fn ask(&mut self, n: usize) -> GsResult<Vec<Vec<f64>>> {
        let mut engine = self.replay()?;
        if engine.num_tell() + n > engine.budget() {
            warn!(
                engine = engine.name(),
                told = engine.num_tell(),
                requested = n,
                budget = engine.budget(),
                "asking beyond the evaluation budget"
            );
        }
        Ok((0..n).map(|_| engine.ask().value).collect())
    }

    fn tell(&mut self, x: &[Vec<f64>], y: &[f64]) -> GsResult<()> {
        if !check_tell(&self.name(), self.param.dims(), x, y)? {
            return Ok(());
        }
        if let Some(v) = y.iter().find(|v| !v.is_finite()) {
            return Err(AlgorithmError::invalid_input(self.algorithm, format!("loss {v} is not finite")).into());
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
        format!("NEVERGRAD-{}", self.algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::Limits;
    use serde_json::json;

    fn settings() -> OptimizerSettings {
        OptimizerSettings::new("NEVERGRAD-OnePlusOne")
            .with_parameter("a", -2.0, 2.0)
            .with_parameter("b", -2.0, 2.0)
    }

    fn build(algorithm: &str, settings: &OptimizerSettings) -> GsResult<EvolutionaryAdapter> {
        let space = SearchSpace::from_settings(settings, &Limits::default()).unwrap();
        EvolutionaryAdapter::new(&space, settings, algorithm, 9)
    }

    fn history(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                vec![-2.0 + 4.0 * t, 1.5 - 3.0 * t * t]
            })
            .collect();
        let y = x.iter().map(|p| p[0] * p[0] + p[1] * p[1]).collect();
        (x, y)
    }

    #[test]
    fn test_replay_consumes_whole_history() {
        for name in registry::NAMES {
            let mut adapter = build(name, &settings()).unwrap();
            let (x, y) = history(20);
            adapter.tell(&x, &y).unwrap();
            let engine = adapter.replay().unwrap();
            assert_eq!(engine.num_tell(), 20, "{name}");
            assert_eq!(engine.num_ask(), 0, "{name}");
        }
    }

    #[test]
    fn test_replay_is_repeatable() {
        let mut adapter = build("DE", &settings()).unwrap();
        let (x, y) = history(40);
        adapter.tell(&x, &y).unwrap();
        let first = adapter.ask(3).unwrap();
        let second = adapter.ask(3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_replay_order_matters() {
        let (mut x, mut y) = history(12);
        let mut forward = build("OnePlusOne", &settings()).unwrap();
        forward.tell(&x, &y).unwrap();

        x.reverse();
        y.reverse();
        let mut backward = build("OnePlusOne", &settings()).unwrap();
        backward.tell(&x, &y).unwrap();

        assert_ne!(forward.ask(1).unwrap(), backward.ask(1).unwrap());
    }

    #[test]
    fn test_unknown_algorithm_is_unknown_backend() {
        let settings = OptimizerSettings::new("NG-CMA")
            .with_parameter("a", 0.0, 1.0);
        match build("CMA", &settings) {
            Err(GsError::UnknownBackend { identifier }) => assert_eq!(identifier, "NG-CMA"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("CMA is not registered"),
        }
        // names are case sensitive
        assert!(build("oneplusone", &settings).is_err());
    }

    #[test]
    fn test_budget_kwarg() {
        let adapter = build("RandomSearch", &settings().with_kwarg("budget", json!(50))).unwrap();
        assert_eq!(adapter.budget(), 50);
        assert_eq!(build("DE", &settings()).unwrap().budget(), DEFAULT_BUDGET);
        assert!(matches!(
            build("DE", &settings().with_kwarg("budget", json!(0))),
            Err(GsError::Validation(_))
        ));
    }

    #[test]
    fn test_non_finite_loss_rejected() {
        let mut adapter = build("OnePlusOne", &settings()).unwrap();
        let err = adapter.tell(&[vec![0.0, 0.0]], &[f64::INFINITY]).unwrap_err();
        assert!(matches!(err, GsError::Algorithm(_)));
        assert_eq!(adapter.state(), AdapterState::Constructed);
    }

    #[test]
    fn test_split_tells_accumulate() {
        let (x, y) = history(15);
        for name in registry::NAMES {
            let mut split = build(name, &settings()).unwrap();
            split.tell(&x[..6], &y[..6]).unwrap();
            split.tell(&x[6..], &y[6..]).unwrap();
            assert_eq!(split.replay().unwrap().num_tell(), 15, "{name}");

            let mut whole = build(name, &settings()).unwrap();
            whole.tell(&x, &y).unwrap();
            assert_eq!(split.ask(3).unwrap(), whole.ask(3).unwrap(), "{name}");
        }
    }
}
