//! Turning caller-supplied history rows into a training set.

use std::str::FromStr;

use gs_types::{
    GsResult, Limits, SearchSpace, TrainingSet, ValidationError, OBJECTIVE_FIELD,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// What to do with a row that has an objective but is otherwise malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordPolicy {
    /// Fail the request, naming the offending field.
    #[default]
    Strict,
    /// Log and drop the row.
    Lenient,
}

impl FromStr for RecordPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown history policy '{other}' (expected strict or lenient)")),
        }
    }
}

/// Row counts from one parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub accepted: usize,
    pub pending: usize,
    pub rejected: usize,
}

enum Row {
    Pending,
    Evaluated(Vec<f64>, f64),
}

pub struct HistoryParser<'a> {
    space: &'a SearchSpace,
    limits: &'a Limits,
    policy: RecordPolicy,
}

impl<'a> HistoryParser<'a> {
    pub fn new(space: &'a SearchSpace, limits: &'a Limits, policy: RecordPolicy) -> Self {
        Self {
            space,
            limits,
            policy,
        }
    }

    /// Project `records` onto the search space, preserving arrival order.
    pub fn parse(&self, records: &[Value]) -> GsResult<(TrainingSet, ParseReport)> {
        self.limits.check_history_len(records.len())?;

        let mut training = TrainingSet::new();
        let mut report = ParseReport::default();

        for (i, record) in records.iter().enumerate() {
            match self.parse_row(i, record) {
                Ok(Row::Pending) => report.pending += 1,
                Ok(Row::Evaluated(x, y)) => {
                    training.push(x, y);
                    report.accepted += 1;
                }
                Err(e) => match self.policy {
                    RecordPolicy::Strict => return Err(e.into()),
                    RecordPolicy::Lenient => {
                        warn!(row = i, field = %e.field, reason = %e.reason, "skipping malformed history record");
                        report.rejected += 1;
                    }
                },
            }
        }

        info!(
            accepted = report.accepted,
            pending = report.pending,
            rejected = report.rejected,
            "history parsed"
        );
        Ok((training, report))
    }

    fn parse_row(&self, i: usize, record: &Value) -> Result<Row, ValidationError> {
        let Value::Object(row) = record else {
            return Err(ValidationError::new(
                format!("existing_data[{i}]"),
                "record must be an object",
            ));
        };

        let objective_field = || format!("existing_data[{i}].{OBJECTIVE_FIELD}");
        let objective = match row.get(OBJECTIVE_FIELD) {
            None | Some(Value::Null) => return Ok(Row::Pending),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(Row::Pending),
            Some(v) => coerce(v).map_err(|reason| ValidationError::new(objective_field(), reason))?,
        };

        let x = self.coordinates(i, row)?;
        Ok(Row::Evaluated(x, objective))
    }

    fn coordinates(&self, i: usize, row: &Map<String, Value>) -> Result<Vec<f64>, ValidationError> {
        self.space
            .dimensions()
            .iter()
            .map(|dim| {
                let field = || format!("existing_data[{i}].{}", dim.name);
                let value = row
                    .get(&dim.name)
                    .ok_or_else(|| ValidationError::new(field(), "missing parameter value"))?;
                let v = coerce(value).map_err(|reason| ValidationError::new(field(), reason))?;
                if !dim.contains(v) {
                    return Err(ValidationError::new(
                        field(),
                        format!("{v} outside [{}, {}]", dim.low, dim.high),
                    ));
                }
                Ok(v)
            })
            .collect()
    }
}

/// A finite number, given as a JSON number or a numeric string.
fn coerce(value: &Value) -> Result<f64, String> {
    let v = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} is not representable"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{s}' is not numeric"))?,
        other => return Err(format!("expected a number, got {other}")),
    };
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("{v} is not finite"))
    }
}
