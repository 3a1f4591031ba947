//! Wire records and the training set projected from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the objective column on the wire.
pub const OBJECTIVE_FIELD: &str = "objective";

/// One row as exchanged with the caller: each parameter name mapped to its
/// value, plus an `objective` cell that is empty until evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterRecord(pub Map<String, Value>);

impl ParameterRecord {
    /// A pending record in the given parameter order.
    pub fn pending<'a>(names: impl Iterator<Item = &'a str>, values: &[f64]) -> Self {
        let mut map = Map::with_capacity(values.len() + 1);
        for (name, &v) in names.zip(values) {
            map.insert(name.to_string(), Value::from(v));
        }
        map.insert(OBJECTIVE_FIELD.to_string(), Value::String(String::new()));
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn is_pending(&self) -> bool {
        match self.0.get(OBJECTIVE_FIELD) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    /// Fill in the objective, turning the record into history.
    pub fn with_objective(mut self, objective: f64) -> Self {
        self.0
            .insert(OBJECTIVE_FIELD.to_string(), Value::from(objective));
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Evaluated points in arrival order.  Recomputed from history on every
/// request and never cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Vec<f64>, objective: f64) {
        self.x.push(point);
        self.y.push(objective);
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Lowest objective seen, if any.
    pub fn best(&self) -> Option<(&[f64], f64)> {
        self.x
            .iter()
            .zip(&self.y)
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(x, &y)| (x.as_slice(), y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_record_serializes_flat_in_order() {
        let record = ParameterRecord::pending(["x", "y"].into_iter(), &[0.25, 0.75]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"x":0.25,"y":0.75,"objective":""}"#);
        assert!(record.is_pending());
        assert_eq!(record.get("y"), Some(0.75));
    }

    #[test]
    fn test_evaluated_record_is_not_pending() {
        let record = ParameterRecord::pending(["x"].into_iter(), &[0.5]).with_objective(0.1);
        assert!(!record.is_pending());
        assert_eq!(record.into_value(), json!({"x": 0.5, "objective": 0.1}));
    }

    #[test]
    fn test_best_picks_lowest_objective() {
        let mut set = TrainingSet::new();
        set.push(vec![0.0], 3.0);
        set.push(vec![1.0], -1.0);
        set.push(vec![2.0], 2.0);
        let (x, y) = set.best().unwrap();
        assert_eq!(x, &[1.0]);
        assert_eq!(y, -1.0);
        assert!(TrainingSet::new().best().is_none());
    }
}
