use gs_engines::{AcqOptimizerKind, AcquisitionKind, RegressorKind, SurrogateConfig, SurrogateOptimizer};
use gs_types::{GsResult, OptimizerSettings, SearchSpace, ValidationError};
use tracing::debug;

use super::{check_tell, AdapterState, BackendAdapter};

/// Bayesian optimization over a regression surrogate.
pub struct SurrogateModelAdapter {
    engine: SurrogateOptimizer,
    dims: usize,
    state: AdapterState,
}

impl SurrogateModelAdapter {
    pub fn new(
        space: &SearchSpace,
        settings: &OptimizerSettings,
        regressor: RegressorKind,
        seed: u64,
    ) -> GsResult<Self> {
        let config = surrogate_config(settings, regressor, seed)?;
        debug!(
            regressor = regressor.code(),
            acquisition = ?config.acquisition,
            acq_optimizer = ?config.acq_optimizer,
            n_initial_points = config.n_initial_points,
            "building surrogate optimizer"
        );
        let engine = SurrogateOptimizer::new(space.bounds(), config)?;
        Ok(Self {
            engine,
            dims: space.len(),
            state: AdapterState::Constructed,
        })
    }

    pub fn config(&self) -> &SurrogateConfig {
        self.engine.config()
    }
}

fn surrogate_config(
    settings: &OptimizerSettings,
    regressor: RegressorKind,
    seed: u64,
) -> GsResult<SurrogateConfig> {
    let mut config = SurrogateConfig::new(regressor, seed);

    config.acquisition = AcquisitionKind::parse(&settings.acquisition_function).ok_or_else(|| {
        ValidationError::new(
            "acquisition_function",
            format!(
                "unknown acquisition function '{}' (expected EI, PI, LCB or gp_hedge)",
                settings.acquisition_function
            ),
        )
    })?;
    config.acq_optimizer = AcqOptimizerKind::parse(&settings.acq_optimizer).map_err(|_| {
        ValidationError::new(
            "acq_optimizer",
            format!(
                "unknown acquisition optimizer '{}' (expected sampling, lbfgs or auto)",
                settings.acq_optimizer
            ),
        )
    })?;

    if let Some(n) = settings.kwarg_usize("n_initial_points")? {
        config.n_initial_points = n;
    }
    if let Some(kappa) = settings.kwarg_f64("kappa")? {
        config.kappa = kappa;
    }
    if let Some(xi) = settings.kwarg_f64("xi")? {
        config.xi = xi;
    }
    if let Some(n) = settings.kwarg_usize("n_points")? {
        if n == 0 {
            return Err(ValidationError::new("acq_func_kwargs.n_points", "must be at least 1").into());
        }
        config.n_candidates = n;
    }
    if let Some(n) = settings.kwarg_usize("n_restarts_optimizer")? {
        config.n_restarts = n;
    }
    Ok(config)
}

impl BackendAdapter for SurrogateModelAdapter {
    fn ask(&mut self, n: usize) -> GsResult<Vec<Vec<f64>>> {
        Ok(self.engine.ask(n)?)
    }

    fn tell(&mut self, x: &[Vec<f64>], y: &[f64]) -> GsResult<()> {
        if !check_tell(&self.name(), self.dims, x, y)? {
            return Ok(());
        }
        self.engine.tell(x, y)?;
        self.state = AdapterState::Trained;
        Ok(())
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    fn name(&self) -> String {
        format!("SKOPT-{}", self.config().regressor.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::{GsError, Limits};
    use serde_json::json;

    fn settings() -> OptimizerSettings {
        OptimizerSettings::new("SKOPT-GP")
            .with_parameter("x", 0.0, 1.0)
            .with_parameter("y", 0.0, 1.0)
    }

    fn build(settings: &OptimizerSettings, regressor: RegressorKind) -> GsResult<SurrogateModelAdapter> {
        let space = SearchSpace::from_settings(settings, &Limits::default()).unwrap();
        SurrogateModelAdapter::new(&space, settings, regressor, 42)
    }

    #[test]
    fn test_reads_settings_and_kwargs() {
        let settings = settings()
            .with_acquisition("gp_hedge", "sampling")
            .with_kwarg("kappa", json!(2.5))
            .with_kwarg("xi", json!(0.05))
            .with_kwarg("n_initial_points", json!(3))
            .with_kwarg("n_points", json!(500));
        let adapter = build(&settings, RegressorKind::RandomForest).unwrap();
        let config = adapter.config();
        assert_eq!(config.acquisition, AcquisitionKind::Hedge);
        assert_eq!(config.acq_optimizer, Some(AcqOptimizerKind::Sampling));
        assert_eq!(config.kappa, 2.5);
        assert_eq!(config.xi, 0.05);
        assert_eq!(config.n_initial_points, 3);
        assert_eq!(config.n_candidates, 500);
        assert_eq!(adapter.name(), "SKOPT-RF");
    }

    #[test]
    fn test_defaults_when_kwargs_absent() {
        let adapter = build(&settings(), RegressorKind::GaussianProcess).unwrap();
        let config = adapter.config();
        assert_eq!(config.acquisition, AcquisitionKind::ExpectedImprovement);
        assert_eq!(config.acq_optimizer, None);
        assert_eq!(config.n_initial_points, 5);
        assert_eq!(config.kappa, 1.96);
        assert_eq!(config.xi, 0.01);
    }

    #[test]
    fn test_bad_acquisition_names_the_field() {
        let cases = [
            (settings().with_acquisition("UCB", "auto"), "acquisition_function"),
            (settings().with_acquisition("EI", "adam"), "acq_optimizer"),
            (settings().with_kwarg("kappa", json!("big")), "acq_func_kwargs.kappa"),
            (settings().with_kwarg("n_initial_points", json!(-1)), "acq_func_kwargs.n_initial_points"),
        ];
        for (settings, field) in cases {
            match build(&settings, RegressorKind::GaussianProcess) {
                Err(GsError::Validation(e)) => assert_eq!(e.field, field),
                Err(other) => panic!("unexpected error {other:?}"),
                Ok(_) => panic!("expected an error on {field}"),
            }
        }
    }

    #[test]
    fn test_tell_moves_to_trained() {
        let mut adapter = build(&settings(), RegressorKind::ExtraTrees).unwrap();
        assert_eq!(adapter.state(), AdapterState::Constructed);
        adapter.tell(&[], &[]).unwrap();
        assert_eq!(adapter.state(), AdapterState::Constructed);
        adapter.tell(&[vec![0.5, 0.5]], &[0.1]).unwrap();
        assert_eq!(adapter.state(), AdapterState::Trained);
        assert_eq!(adapter.ask(2).unwrap().len(), 2);
    }

    #[test]
    fn test_split_tells_accumulate() {
        let x: Vec<Vec<f64>> = (0..9)
            .map(|i| vec![i as f64 / 8.0, ((i * 5) % 9) as f64 / 8.0])
            .collect();
        let y: Vec<f64> = x.iter().map(|p| (p[0] - 0.4).powi(2) + (p[1] - 0.6).powi(2)).collect();
        for regressor in [
            RegressorKind::GaussianProcess,
            RegressorKind::RandomForest,
            RegressorKind::ExtraTrees,
            RegressorKind::GradientBoosting,
        ] {
            let mut split = build(&settings(), regressor).unwrap();
            split.tell(&x[..3], &y[..3]).unwrap();
            split.tell(&x[3..], &y[3..]).unwrap();
            let mut whole = build(&settings(), regressor).unwrap();
            whole.tell(&x, &y).unwrap();
            assert_eq!(split.state(), AdapterState::Trained);
            assert_eq!(split.ask(2).unwrap(), whole.ask(2).unwrap(), "{}", regressor.code());
        }
    }
}
