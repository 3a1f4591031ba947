use gs_types::{ParameterRecord, SearchSpace};

/// Proposed points as pending wire records, in declared parameter order.
pub struct ResponseFormatter<'a> {
    space: &'a SearchSpace,
}

impl<'a> ResponseFormatter<'a> {
    pub fn new(space: &'a SearchSpace) -> Self {
        Self { space }
    }

    pub fn format(&self, points: &[Vec<f64>]) -> Vec<ParameterRecord> {
        points
            .iter()
            .map(|p| ParameterRecord::pending(self.space.names(), p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::{Limits, OptimizerSettings};

    #[test]
    fn test_records_follow_declared_order() {
        let settings = OptimizerSettings::new("RANDOM")
            .with_parameter("zeta", 0.0, 1.0)
            .with_parameter("alpha", 0.0, 1.0);
        let space = SearchSpace::from_settings(&settings, &Limits::default()).unwrap();
        let records = ResponseFormatter::new(&space).format(&[vec![0.25, 0.75]]);

        assert_eq!(records.len(), 1);
        let json = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(json, r#"{"zeta":0.25,"alpha":0.75,"objective":""}"#);
        assert!(records[0].is_pending());
    }
}
