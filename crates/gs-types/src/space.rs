//! Validated search space definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::{GsResult, ValidationError};
use crate::limits::Limits;
use crate::record::OBJECTIVE_FIELD;
use crate::settings::OptimizerSettings;

/// A single continuous dimension `[low, high]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl Dimension {
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// The full search space: an ordered list of dimensions.
///
/// Only obtainable through [`SearchSpace::from_settings`] or
/// [`SearchSpace::from_dimensions`], both of which validate, so holders can
/// rely on unique names and `low < high`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSpace {
    dimensions: Vec<Dimension>,
}

impl SearchSpace {
    /// Validate the parameter block of `settings`.  Stops at the first
    /// violation.
    pub fn from_settings(settings: &OptimizerSettings, limits: &Limits) -> GsResult<Self> {
        let count = settings.param_names.len();
        if count == 0 {
            return Err(ValidationError::new("param_names", "at least one parameter is required").into());
        }
        limits.check_parameter_count(count)?;

        if let Some(declared) = settings.num_params {
            if declared != count {
                return Err(ValidationError::new(
                    "num_params",
                    format!("declares {declared} parameters but {count} names were given"),
                )
                .into());
            }
        }
        if settings.param_mins.len() != count {
            return Err(ValidationError::new(
                "param_mins",
                format!("expected {count} values, got {}", settings.param_mins.len()),
            )
            .into());
        }
        if settings.param_maxes.len() != count {
            return Err(ValidationError::new(
                "param_maxes",
                format!("expected {count} values, got {}", settings.param_maxes.len()),
            )
            .into());
        }

        let dimensions = settings
            .param_names
            .iter()
            .zip(settings.param_mins.iter().zip(settings.param_maxes.iter()))
            .map(|(name, (&low, &high))| Dimension {
                name: name.clone(),
                low,
                high,
            })
            .collect();

        Self::from_dimensions(dimensions, limits)
    }

    pub fn from_dimensions(dimensions: Vec<Dimension>, limits: &Limits) -> GsResult<Self> {
        if dimensions.is_empty() {
            return Err(ValidationError::new("param_names", "at least one parameter is required").into());
        }
        limits.check_parameter_count(dimensions.len())?;

        let mut seen = HashSet::with_capacity(dimensions.len());
        for (i, dim) in dimensions.iter().enumerate() {
            check_name(&dim.name, i, limits)?;
            if !seen.insert(dim.name.as_str()) {
                return Err(ValidationError::new(
                    format!("param_names[{i}]"),
                    format!("duplicate parameter name '{}'", dim.name),
                )
                .into());
            }
        }

        for (i, dim) in dimensions.iter().enumerate() {
            check_bound(dim.low, &format!("param_mins[{i}]"), limits)?;
            check_bound(dim.high, &format!("param_maxes[{i}]"), limits)?;
            if dim.low >= dim.high {
                return Err(ValidationError::new(
                    format!("param_mins[{i}]"),
                    format!(
                        "minimum {} must be strictly less than maximum {} for '{}'",
                        dim.low, dim.high, dim.name
                    ),
                )
                .into());
            }
        }

        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    /// `(low, high)` pairs in declared order.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.dimensions.iter().map(|d| (d.low, d.high)).collect()
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dimensions.len()
            && self
                .dimensions
                .iter()
                .zip(point)
                .all(|(dim, &v)| dim.contains(v))
    }

    /// Clamp every coordinate into its dimension's bounds.
    pub fn clamp(&self, point: &mut [f64]) {
        for (dim, v) in self.dimensions.iter().zip(point.iter_mut()) {
            *v = v.clamp(dim.low, dim.high);
        }
    }
}

fn check_name(name: &str, index: usize, limits: &Limits) -> GsResult<()> {
    let field = || format!("param_names[{index}]");
    if name.is_empty() {
        return Err(ValidationError::new(field(), "parameter name must not be empty").into());
    }
    if name.len() > limits.max_name_len {
        return Err(ValidationError::new(
            field(),
            format!("parameter name longer than {} characters", limits.max_name_len),
        )
        .into());
    }
    if name == OBJECTIVE_FIELD {
        return Err(ValidationError::new(field(), "'objective' is reserved").into());
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !first_ok || !rest_ok {
        return Err(ValidationError::new(
            field(),
            format!(
                "'{name}' must start with a letter or underscore and contain only letters, digits, '_', '-' or '.'"
            ),
        )
        .into());
    }
    Ok(())
}

fn check_bound(value: f64, field: &str, limits: &Limits) -> GsResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "bound must be finite").into());
    }
    if value.abs() > limits.max_abs_bound {
        return Err(ValidationError::new(
            field,
            format!("magnitude of {value} exceeds {:e}", limits.max_abs_bound),
        )
        .into());
    }
    Ok(())
}
