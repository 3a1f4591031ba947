//! The two boundary operations: initialize and continue.

use std::time::Instant;

use gs_types::{GsResult, Limits, OptimizerSettings, ParameterRecord, SearchSpace, TrainingSet};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::adapters::BackendAdapter;
use crate::factory::OptimizerFactory;
use crate::formatter::ResponseFormatter;
use crate::history::{HistoryParser, ParseReport, RecordPolicy};
use crate::padding::PaddingPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitRequest {
    pub settings: OptimizerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueRequest {
    pub settings: OptimizerSettings,
    #[serde(default)]
    pub existing_data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResponse {
    /// Canonical adapter name, e.g. `SKOPT-GP`.
    pub backend: String,
    pub points: Vec<ParameterRecord>,
    pub report: ParseReport,
}

/// Stateless request handler.  Every call rebuilds the optimizer from the
/// request alone.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    limits: Limits,
    policy: RecordPolicy,
    factory: OptimizerFactory,
}

impl Orchestrator {
    pub fn new(limits: Limits, policy: RecordPolicy, padding: PaddingPolicy) -> Self {
        Self {
            limits,
            policy,
            factory: OptimizerFactory::new(padding),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn policy(&self) -> RecordPolicy {
        self.policy
    }

    pub fn initialize(&self, request: InitRequest) -> GsResult<OptimizationResponse> {
        let settings = request.settings;
        let n = settings.num_init_points;
        self.run(&settings, &[], n)
    }

    pub fn continue_optimization(&self, request: ContinueRequest) -> GsResult<OptimizationResponse> {
        let settings = request.settings;
        let n = settings.batch_size;
        self.run(&settings, &request.existing_data, n)
    }

    fn run(&self, settings: &OptimizerSettings, history: &[Value], n: usize) -> GsResult<OptimizationResponse> {
        let started = Instant::now();

        settings.validate_counts(&self.limits)?;
        self.limits.check_history_len(history.len())?;
        let space = SearchSpace::from_settings(settings, &self.limits)?;

        let (training, report) = if history.is_empty() {
            (TrainingSet::new(), ParseReport::default())
        } else {
            HistoryParser::new(&space, &self.limits, self.policy).parse(history)?
        };

        let mut rng = match settings.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut adapter = self.factory.build(&space, settings, &training, &mut rng)?;
        let points = adapter.ask(n)?;

        info!(
            backend = %adapter.name(),
            dims = space.len(),
            history = history.len(),
            trained_on = training.len(),
            best_objective = training.best().map(|(_, y)| y),
            returned = points.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "optimization step complete"
        );

        Ok(OptimizationResponse {
            backend: adapter.name(),
            points: ResponseFormatter::new(&space).format(&points),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::{GsError, ResourceLimitError};
    use serde_json::json;

    fn settings(estimator: &str) -> OptimizerSettings {
        OptimizerSettings::new(estimator)
            .with_parameter("x", 0.0, 1.0)
            .with_parameter("y", 0.0, 1.0)
            .with_num_init_points(3)
            .with_batch_size(2)
            .with_random_state(7)
    }

    #[test]
    fn test_limits_checked_before_history() {
        let orchestrator = Orchestrator::new(
            Limits {
                max_batch_size: 1,
                ..Limits::default()
            },
            RecordPolicy::Strict,
            PaddingPolicy::Uniform,
        );
        // malformed history would fail parsing; the batch limit must win
        let request = ContinueRequest {
            settings: settings("GP"),
            existing_data: vec![json!("not a record")],
        };
        let err = orchestrator.continue_optimization(request).unwrap_err();
        assert!(matches!(
            err,
            GsError::ResourceLimit(ResourceLimitError::BatchTooLarge { count: 2, limit: 1 })
        ));
    }

    #[test]
    fn test_invalid_space_rejected_before_construction() {
        let mut s = settings("NOT-A-BACKEND");
        s.param_mins[1] = 1.0;
        let err = Orchestrator::default()
            .initialize(InitRequest { settings: s })
            .unwrap_err();
        match err {
            GsError::Validation(e) => assert!(e.field.starts_with("param_")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_report_is_returned() {
        let request = ContinueRequest {
            settings: settings("RANDOM"),
            existing_data: vec![
                json!({"x": 0.5, "y": 0.5, "objective": 0.1}),
                json!({"x": 0.1, "y": 0.9, "objective": ""}),
            ],
        };
        let response = Orchestrator::default().continue_optimization(request).unwrap();
        assert_eq!(response.backend, "RANDOM");
        assert_eq!(response.points.len(), 2);
        assert_eq!(
            response.report,
            ParseReport {
                accepted: 1,
                pending: 1,
                rejected: 0
            }
        );
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: ContinueRequest = serde_json::from_value(json!({
            "settings": {
                "param_names": ["a"],
                "param_mins": [0.0],
                "param_maxes": [1.0]
            }
        }))
        .unwrap();
        assert!(request.existing_data.is_empty());
        assert_eq!(request.settings.base_estimator, "GP");
        assert_eq!(request.settings.batch_size, 10);
    }
}
