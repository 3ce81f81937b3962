//! Application configuration, loaded from YAML.

use qc_store::FormatRules;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub load: Option<String>,
    pub save: Option<String>,
    pub request: Option<String>,
}

/// The remote operations that each need an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Load,
    Save,
    Request,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Load => f.write_str("load"),
            Endpoint::Save => f.write_str("save"),
            Endpoint::Request => f.write_str("request"),
        }
    }
}

impl Endpoints {
    pub fn get(&self, endpoint: Endpoint) -> Option<&str> {
        match endpoint {
            Endpoint::Load => self.load.as_deref(),
            Endpoint::Save => self.save.as_deref(),
            Endpoint::Request => self.request.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub chunk_size: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoints: Endpoints,
    /// Sent as `X-CSRF-Token` on writes.
    pub csrf_token: Option<String>,
    /// Sent as a bearer token on every request.
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
    pub bulk: BulkConfig,
    pub variance: FormatRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            csrf_token: None,
            auth_token: None,
            timeout_ms: 30_000,
            retry: RetryPolicy::default(),
            bulk: BulkConfig::default(),
            variance: FormatRules::default(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        serde_yaml::from_str(content).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = AppConfig::from_yaml_str(
            "endpoints:\n  load: https://lims.example/api/jobs/17\ncsrf_token: abc\n",
        )
        .unwrap();
        assert_eq!(
            config.endpoints.load.as_deref(),
            Some("https://lims.example/api/jobs/17")
        );
        assert_eq!(config.endpoints.save, None);
        assert_eq!(config.csrf_token.as_deref(), Some("abc"));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.bulk.chunk_size, 100);
        assert_eq!(config.variance, FormatRules::default());
    }

    #[test]
    fn variance_tables_are_configurable() {
        let config = AppConfig::from_yaml_str("variance:\n  crd:\n    high: 30\n    medium: 15\n").unwrap();
        assert_eq!(config.variance.crd.high, 30.0);
        assert_eq!(config.variance.dup, qc_store::DUP_VARIANCE_THRESHOLDS);
    }

    #[test]
    fn endpoints_resolve_by_kind() {
        let config = AppConfig::from_yaml_str(
            "endpoints:\n  save: https://lims.example/save\n  request: https://lims.example/req\n",
        )
        .unwrap();
        assert_eq!(config.endpoints.get(Endpoint::Load), None);
        assert_eq!(config.endpoints.get(Endpoint::Save), Some("https://lims.example/save"));
        assert_eq!(config.endpoints.get(Endpoint::Request), Some("https://lims.example/req"));
        assert_eq!(Endpoint::Request.to_string(), "request");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(350));
        assert_eq!(policy.delay(70), Duration::from_millis(350));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Path::new("/nonexistent/qc.yaml")).unwrap_err();
        assert!(matches!(err, AppError::ConfigRead { .. }));
    }
}
