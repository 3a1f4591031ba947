//! Resolving a `base_estimator` string to an engine family.

use gs_engines::evolution::registry;
use gs_engines::RegressorKind;
use gs_types::{GsError, GsResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Surrogate(RegressorKind),
    /// Registry name, not yet checked against the registry.
    Evolutionary(String),
    BranchAndFit,
    Random,
}

impl BackendKind {
    /// Accepts `PREFIX-ALGORITHM` (split at the first `-`) or a bare name.
    ///
    /// ```
    /// use gs_optimizer::BackendKind;
    /// use gs_engines::RegressorKind;
    ///
    /// assert_eq!(
    ///     BackendKind::parse("skopt-rf").unwrap(),
    ///     BackendKind::Surrogate(RegressorKind::RandomForest)
    /// );
    /// assert_eq!(
    ///     BackendKind::parse("NG-TwoPointsDE").unwrap(),
    ///     BackendKind::Evolutionary("TwoPointsDE".to_string())
    /// );
    /// assert!(BackendKind::parse("SNOBFIT-x").is_err());
    /// ```
    pub fn parse(identifier: &str) -> GsResult<Self> {
        let unknown = || GsError::unknown_backend(identifier);
        let trimmed = identifier.trim();

        if let Some((prefix, algorithm)) = trimmed.split_once('-') {
            return match prefix.to_ascii_uppercase().as_str() {
                "SKOPT" => RegressorKind::parse(algorithm)
                    .map(Self::Surrogate)
                    .ok_or_else(unknown),
                "NEVERGRAD" | "NG" if !algorithm.is_empty() => {
                    Ok(Self::Evolutionary(evolutionary_alias(algorithm)))
                }
                _ => Err(unknown()),
            };
        }

        match trimmed.to_ascii_uppercase().as_str() {
            "RANDOM" => Ok(Self::Random),
            "SNOBFIT" => Ok(Self::BranchAndFit),
            "NEVERGRAD" | "NGOPT" => Ok(Self::Evolutionary(registry::DEFAULT.to_string())),
            _ => RegressorKind::parse(trimmed)
                .map(Self::Surrogate)
                .ok_or_else(unknown),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Self::Surrogate(_) => "surrogate",
            Self::Evolutionary(_) => "evolutionary",
            Self::BranchAndFit => "branch-and-fit",
            Self::Random => "random",
        }
    }
}

/// Meta-optimizer names fall back to the default strategy.
fn evolutionary_alias(algorithm: &str) -> String {
    match algorithm.to_ascii_uppercase().as_str() {
        "NEVERGRAD" | "NGOPT" => registry::DEFAULT.to_string(),
        _ => algorithm.to_string(),
    }
}
