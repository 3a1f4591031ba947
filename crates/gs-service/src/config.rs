//! Deployment settings read from the environment.

use std::str::FromStr;
use std::time::Duration;

use gs_optimizer::{PaddingPolicy, RecordPolicy};
use gs_types::{config_error, GsResult, Limits};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_COMMIT: &str = "development";
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub addr: String,
    /// Reported by `/ping`.
    pub commit: String,
    pub max_content_length: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: usize,
    pub history_policy: RecordPolicy,
    pub padding_policy: PaddingPolicy,
    pub limits: Limits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            commit: DEFAULT_COMMIT.to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 10,
            history_policy: RecordPolicy::default(),
            padding_policy: PaddingPolicy::default(),
            limits: Limits::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> GsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GsResult<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("GSOPT_ADDR") {
            config.addr = addr;
        }
        if let Some(commit) = lookup("COMMIT_SHA") {
            config.commit = commit;
        }
        if let Some(v) = parsed::<usize>(&lookup, "GSOPT_MAX_CONTENT_LENGTH")? {
            config.max_content_length = v;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "GSOPT_RATE_LIMIT_WINDOW_SECS")? {
            if secs == 0 {
                return Err(config_error!("GSOPT_RATE_LIMIT_WINDOW_SECS must be positive"));
            }
            config.rate_limit_window = Duration::from_secs(secs);
        }
        if let Some(v) = parsed::<usize>(&lookup, "GSOPT_RATE_LIMIT_MAX_REQUESTS")? {
            config.rate_limit_max_requests = v;
        }
        if let Some(policy) = parsed::<RecordPolicy>(&lookup, "GSOPT_HISTORY_POLICY")? {
            config.history_policy = policy;
        }
        if let Some(policy) = parsed::<PaddingPolicy>(&lookup, "GSOPT_PADDING_POLICY")? {
            config.padding_policy = policy;
        }
        Ok(config)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> GsResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| config_error!("{key}={raw:?}: {e}")),
    }
}
