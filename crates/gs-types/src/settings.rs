//! Optimizer settings as sent by the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{GsResult, ValidationError};
use crate::limits::Limits;

fn default_base_estimator() -> String {
    "GP".to_string()
}

fn default_acquisition_function() -> String {
    "EI".to_string()
}

fn default_acq_optimizer() -> String {
    "auto".to_string()
}

fn default_point_count() -> usize {
    10
}

/// Settings block of an `init-optimization` / `continue-optimization`
/// request.  Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Backend identifier, e.g. "SKOPT-GP", "NEVERGRAD-OnePlusOne",
    /// "SNOBFIT", "RANDOM", or a legacy bare regressor name.
    #[serde(default = "default_base_estimator")]
    pub base_estimator: String,

    #[serde(default = "default_acquisition_function")]
    pub acquisition_function: String,

    #[serde(default = "default_acq_optimizer")]
    pub acq_optimizer: String,

    /// Backend-specific options passed through untouched.
    #[serde(default)]
    pub acq_func_kwargs: Map<String, Value>,

    #[serde(default)]
    pub num_params: Option<usize>,

    pub param_names: Vec<String>,
    pub param_mins: Vec<f64>,
    pub param_maxes: Vec<f64>,

    #[serde(default = "default_point_count")]
    pub num_init_points: usize,

    #[serde(default = "default_point_count")]
    pub batch_size: usize,

    #[serde(default)]
    pub random_state: Option<u64>,
}

impl OptimizerSettings {
    pub fn new(base_estimator: &str) -> Self {
        Self {
            base_estimator: base_estimator.to_string(),
            acquisition_function: default_acquisition_function(),
            acq_optimizer: default_acq_optimizer(),
            acq_func_kwargs: Map::new(),
            num_params: None,
            param_names: Vec::new(),
            param_mins: Vec::new(),
            param_maxes: Vec::new(),
            num_init_points: default_point_count(),
            batch_size: default_point_count(),
            random_state: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.param_names.push(name.into());
        self.param_mins.push(low);
        self.param_maxes.push(high);
        self
    }

    pub fn with_acquisition(mut self, function: &str, optimizer: &str) -> Self {
        self.acquisition_function = function.to_string();
        self.acq_optimizer = optimizer.to_string();
        self
    }

    pub fn with_kwarg(mut self, key: &str, value: Value) -> Self {
        self.acq_func_kwargs.insert(key.to_string(), value);
        self
    }

    pub fn with_num_init_points(mut self, n: usize) -> Self {
        self.num_init_points = n;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Check the point counts against `limits`.  Zero is a validation
    /// error, oversize is a resource-limit error.
    pub fn validate_counts(&self, limits: &Limits) -> GsResult<()> {
        if self.num_init_points == 0 {
            return Err(ValidationError::new("num_init_points", "must be at least 1").into());
        }
        limits.check_init_points(self.num_init_points)?;

        if self.batch_size == 0 {
            return Err(ValidationError::new("batch_size", "must be at least 1").into());
        }
        limits.check_batch_size(self.batch_size)?;

        if let Some(n) = self.kwarg_usize("n_points")? {
            limits.check_acq_points(n)?;
        }
        if let Some(n) = self.kwarg_usize("n_restarts_optimizer")? {
            limits.check_acq_restarts(n)?;
        }
        Ok(())
    }

    /// A finite numeric pass-through option.
    pub fn kwarg_f64(&self, key: &str) -> GsResult<Option<f64>> {
        let field = || format!("acq_func_kwargs.{key}");
        match self.acq_func_kwargs.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(ValidationError::new(field(), "must be a finite number").into()),
            },
            Some(other) => Err(ValidationError::new(
                field(),
                format!("expected a number, got {other}"),
            )
            .into()),
        }
    }

    /// A non-negative integer pass-through option.
    pub fn kwarg_usize(&self, key: &str) -> GsResult<Option<usize>> {
        match self.acq_func_kwargs.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(v) => Ok(Some(v as usize)),
                None => Err(ValidationError::new(
                    format!("acq_func_kwargs.{key}"),
                    "must be a non-negative integer",
                )
                .into()),
            },
            Some(other) => Err(ValidationError::new(
                format!("acq_func_kwargs.{key}"),
                format!("expected an integer, got {other}"),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{GsError, ResourceLimitError};
    use serde_json::json;

    #[test]
    fn test_deserializes_spreadsheet_payload() {
        let payload = json!({
            "base_estimator": "SKOPT-GP",
            "acquisition_function": "LCB",
            "acq_optimizer": "auto",
            "acq_func_kwargs": {"kappa": 1.96},
            "num_params": 2,
            "param_names": ["x", "y"],
            "param_mins": [0.0, 0.0],
            "param_maxes": [1.0, 1.0],
            "num_init_points": 3,
            "batch_size": 2,
            "random_state": 42,
            "sheet_name": "ignored"
        });
        let settings: OptimizerSettings = serde_json::from_value(payload).unwrap();
        assert_eq!(settings.base_estimator, "SKOPT-GP");
        assert_eq!(settings.num_init_points, 3);
        assert_eq!(settings.random_state, Some(42));
        assert_eq!(settings.kwarg_f64("kappa").unwrap(), Some(1.96));
        assert_eq!(settings.kwarg_f64("xi").unwrap(), None);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let payload = json!({
            "param_names": ["x"],
            "param_mins": [0.0],
            "param_maxes": [1.0]
        });
        let settings: OptimizerSettings = serde_json::from_value(payload).unwrap();
        assert_eq!(settings.base_estimator, "GP");
        assert_eq!(settings.acquisition_function, "EI");
        assert_eq!(settings.batch_size, 10);
        assert!(settings.acq_func_kwargs.is_empty());
    }

    #[test]
    fn test_count_validation() {
        let limits = Limits::default();
        let ok = OptimizerSettings::new("RANDOM").with_batch_size(100);
        assert!(ok.validate_counts(&limits).is_ok());

        let zero = OptimizerSettings::new("RANDOM").with_batch_size(0);
        assert!(matches!(
            zero.validate_counts(&limits),
            Err(GsError::Validation(_))
        ));

        let big = OptimizerSettings::new("RANDOM").with_num_init_points(5000);
        assert!(matches!(
            big.validate_counts(&limits),
            Err(GsError::ResourceLimit(ResourceLimitError::TooManyInitPoints { .. }))
        ));
    }

    #[test]
    fn test_oversized_acquisition_kwargs_are_rejected() {
        let limits = Limits::default();
        let huge = OptimizerSettings::new("SKOPT-GP").with_kwarg("n_points", json!(4_000_000_000u64));
        let err = huge.validate_counts(&limits).unwrap_err();
        assert!(matches!(
            err,
            GsError::ResourceLimit(ResourceLimitError::AcquisitionTooLarge { count: 4_000_000_000, .. })
        ));
        assert_eq!(err.field(), Some("acq_func_kwargs.n_points"));

        let restarts = OptimizerSettings::new("SKOPT-GP").with_kwarg("n_restarts_optimizer", json!(1000));
        assert_eq!(
            restarts.validate_counts(&limits).unwrap_err().field(),
            Some("acq_func_kwargs.n_restarts_optimizer")
        );

        let fine = OptimizerSettings::new("SKOPT-GP")
            .with_kwarg("n_points", json!(10_000))
            .with_kwarg("n_restarts_optimizer", json!(5));
        assert!(fine.validate_counts(&limits).is_ok());
    }

    #[test]
    fn test_kwarg_type_errors_name_the_field() {
        let settings = OptimizerSettings::new("GP")
            .with_kwarg("kappa", json!("high"))
            .with_kwarg("budget", json!(-3));
        let err = settings.kwarg_f64("kappa").unwrap_err();
        assert_eq!(err.field(), Some("acq_func_kwargs.kappa"));
        assert!(settings.kwarg_usize("budget").is_err());
    }
}
