//! Environment-driven service configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::coordinator::CoordinatorConfig;
use crate::product_store::IntentRetention;
use crate::reconciliation::reconciler::DEFAULT_MAX_ATTEMPTS;
use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by both service binaries. Each binary reads the parts it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub product_bind: SocketAddr,
    pub transaction_bind: SocketAddr,
    pub product_service_url: String,
    pub product_client_timeout: Duration,
    pub retry: RetryPolicy,
    pub workflow_timeout: Duration,
    /// Zero disables the periodic reconciler.
    pub reconcile_interval: Duration,
    /// Replays per reconciliation entry before it needs an operator.
    pub reconcile_max_attempts: u32,
    /// Product service: how long applied intent tokens are kept.
    pub intent_retention: IntentRetention,
    /// When set, stores are backed by Postgres.
    pub database_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let coordinator = CoordinatorConfig::default();
        Self {
            product_bind: SocketAddr::from(([0, 0, 0, 0], 5001)),
            transaction_bind: SocketAddr::from(([0, 0, 0, 0], 5002)),
            product_service_url: "http://localhost:5001".to_string(),
            product_client_timeout: Duration::from_millis(2000),
            retry: coordinator.retry,
            workflow_timeout: coordinator.workflow_timeout,
            reconcile_interval: Duration::from_secs(60),
            reconcile_max_attempts: DEFAULT_MAX_ATTEMPTS,
            intent_retention: IntentRetention::default(),
            database_url: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let get = |var: &'static str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let retry = RetryPolicy::exponential(
            parse(&get, "STOCK_RETRY_MAX_ATTEMPTS", d.retry.max_attempts)?,
            millis(&get, "STOCK_RETRY_BASE_MS", d.retry.base_delay)?,
            millis(&get, "STOCK_RETRY_MAX_MS", d.retry.max_delay)?,
        );
        if retry.base_delay > retry.max_delay {
            return Err(ConfigError::Invalid {
                var: "STOCK_RETRY_BASE_MS",
                value: retry.base_delay.as_millis().to_string(),
                reason: "must not exceed STOCK_RETRY_MAX_MS".to_string(),
            });
        }

        let workflow_timeout = millis(&get, "WORKFLOW_TIMEOUT_MS", d.workflow_timeout)?;
        if workflow_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "WORKFLOW_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let reconcile_max_attempts = parse(&get, "RECONCILE_MAX_ATTEMPTS", d.reconcile_max_attempts)?;
        if reconcile_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "RECONCILE_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let intent_retention = IntentRetention {
            window: Duration::from_secs(
                parse(&get, "INTENT_RETENTION_HOURS", d.intent_retention.window.as_secs() / 3600)?
                    .saturating_mul(3600),
            ),
            interval: Duration::from_secs(parse(
                &get,
                "INTENT_PRUNE_INTERVAL_SECS",
                d.intent_retention.interval.as_secs(),
            )?),
        };
        if intent_retention.window.is_zero() {
            return Err(ConfigError::Invalid {
                var: "INTENT_RETENTION_HOURS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let product_service_url = get("PRODUCT_SERVICE_URL").unwrap_or(d.product_service_url);
        if !(product_service_url.starts_with("http://") || product_service_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "PRODUCT_SERVICE_URL",
                value: product_service_url,
                reason: "must be an http(s) URL".to_string(),
            });
        }

        Ok(Self {
            product_bind: parse(&get, "PRODUCT_SERVICE_BIND", d.product_bind)?,
            transaction_bind: parse(&get, "TRANSACTION_SERVICE_BIND", d.transaction_bind)?,
            product_service_url,
            product_client_timeout: millis(&get, "PRODUCT_CLIENT_TIMEOUT_MS", d.product_client_timeout)?,
            retry,
            workflow_timeout,
            reconcile_interval: Duration::from_secs(parse(
                &get,
                "RECONCILE_INTERVAL_SECS",
                d.reconcile_interval.as_secs(),
            )?),
            reconcile_max_attempts,
            intent_retention,
            database_url: get("DATABASE_URL"),
        })
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            retry: self.retry,
            workflow_timeout: self.workflow_timeout,
        }
    }
}

fn parse<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&'static str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn millis<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&'static str) -> Option<String>,
{
    let ms = parse(get, var, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}
