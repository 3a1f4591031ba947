//! Request size bounds, checked before any computation starts.

use serde::{Deserialize, Serialize};

use crate::errors::{GsResult, ResourceLimitError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub max_parameters: usize,
    pub max_init_points: usize,
    pub max_batch_size: usize,
    /// Maximum number of history records, pending ones included.
    pub max_data_points: usize,
    /// Largest absolute value accepted for a bound.
    pub max_abs_bound: f64,
    pub max_name_len: usize,
    /// Acquisition candidates scored per proposed point.
    pub max_acq_points: usize,
    pub max_acq_restarts: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_parameters: 100,
            max_init_points: 1000,
            max_batch_size: 100,
            max_data_points: 10_000,
            max_abs_bound: 1e10,
            max_name_len: 64,
            max_acq_points: 100_000,
            max_acq_restarts: 50,
        }
    }
}

impl Limits {
    pub fn check_history_len(&self, count: usize) -> GsResult<()> {
        if count > self.max_data_points {
            return Err(ResourceLimitError::HistoryTooLong {
                count,
                limit: self.max_data_points,
            }
            .into());
        }
        Ok(())
    }

    pub fn check_parameter_count(&self, count: usize) -> GsResult<()> {
        if count > self.max_parameters {
            return Err(ResourceLimitError::TooManyParameters {
                count,
                limit: self.max_parameters,
            }
            .into());
        }
        Ok(())
    }

    pub fn check_batch_size(&self, count: usize) -> GsResult<()> {
        if count > self.max_batch_size {
            return Err(ResourceLimitError::BatchTooLarge {
                count,
                limit: self.max_batch_size,
            }
            .into());
        }
        Ok(())
    }

    pub fn check_acq_points(&self, count: usize) -> GsResult<()> {
        if count > self.max_acq_points {
            return Err(ResourceLimitError::AcquisitionTooLarge {
                option: "acq_func_kwargs.n_points",
                count,
                limit: self.max_acq_points,
            }
            .into());
        }
        Ok(())
    }

    pub fn check_acq_restarts(&self, count: usize) -> GsResult<()> {
        if count > self.max_acq_restarts {
            return Err(ResourceLimitError::AcquisitionTooLarge {
                option: "acq_func_kwargs.n_restarts_optimizer",
                count,
                limit: self.max_acq_restarts,
            }
            .into());
        }
        Ok(())
    }

    pub fn check_init_points(&self, count: usize) -> GsResult<()> {
        if count > self.max_init_points {
            return Err(ResourceLimitError::TooManyInitPoints {
                count,
                limit: self.max_init_points,
            }
            .into());
        }
        Ok(())
    }
}
