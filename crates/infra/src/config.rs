//! Configuration loading and representation.

use std::time::Duration;

use thiserror::Error;

use stockroom_inventory::NegativeStockPolicy;

use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Runtime configuration for the ledger services and the Postgres store.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryConfig {
    /// Postgres URL; only the Postgres store needs it.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Upper bound on waiting for row locks inside one unit of work.
    pub lock_timeout: Duration,
    pub retry: RetryPolicy,
    pub negative_stock: NegativeStockPolicy,
    /// Roles whose users receive stock alerts.
    pub alert_roles: Vec<String>,
    /// Role required for ledger deletion and reconciliation.
    pub admin_role: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            lock_timeout: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
            negative_stock: NegativeStockPolicy::Reject,
            alert_roles: vec![
                "admin".to_string(),
                "management".to_string(),
                "warehouse".to_string(),
            ],
            admin_role: "admin".to_string(),
        }
    }
}

impl InventoryConfig {
    /// Load configuration from environment variables (and `.env`) with defaults.
    ///
    /// | Env Var                        | Default                      |
    /// |--------------------------------|------------------------------|
    /// | `DATABASE_URL`                 | unset                        |
    /// | `STOCKROOM_DB_MAX_CONNECTIONS` | `10`                         |
    /// | `STOCKROOM_LOCK_TIMEOUT_MS`    | `2000`                       |
    /// | `STOCKROOM_RETRY_ATTEMPTS`     | `3`                          |
    /// | `STOCKROOM_RETRY_BASE_MS`      | `25`                         |
    /// | `STOCKROOM_NEGATIVE_STOCK`     | `reject`                     |
    /// | `STOCKROOM_ALERT_ROLES`        | `admin,management,warehouse` |
    /// | `STOCKROOM_ADMIN_ROLE`         | `admin`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL");

        let db_max_connections = match get("STOCKROOM_DB_MAX_CONNECTIONS") {
            Some(v) => parse_number("STOCKROOM_DB_MAX_CONNECTIONS", &v)?,
            None => defaults.db_max_connections,
        };

        let lock_timeout = match get("STOCKROOM_LOCK_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse_number("STOCKROOM_LOCK_TIMEOUT_MS", &v)?),
            None => defaults.lock_timeout,
        };

        let mut retry = defaults.retry.clone();
        if let Some(v) = get("STOCKROOM_RETRY_ATTEMPTS") {
            retry.max_attempts = parse_number("STOCKROOM_RETRY_ATTEMPTS", &v)?;
            if retry.max_attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: "STOCKROOM_RETRY_ATTEMPTS",
                    value: v,
                    reason: "must be at least 1",
                });
            }
        }
        if let Some(v) = get("STOCKROOM_RETRY_BASE_MS") {
            retry.base_delay = Duration::from_millis(parse_number("STOCKROOM_RETRY_BASE_MS", &v)?);
        }

        let negative_stock = match get("STOCKROOM_NEGATIVE_STOCK") {
            Some(v) => NegativeStockPolicy::parse(&v).ok_or(ConfigError::Invalid {
                key: "STOCKROOM_NEGATIVE_STOCK",
                value: v,
                reason: "expected `reject` or `allow`",
            })?,
            None => defaults.negative_stock,
        };

        let alert_roles = match get("STOCKROOM_ALERT_ROLES") {
            Some(v) => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.alert_roles,
        };

        let admin_role = get("STOCKROOM_ADMIN_ROLE").unwrap_or(defaults.admin_role);

        Ok(Self {
            database_url,
            db_max_connections,
            lock_timeout,
            retry,
            negative_stock,
            alert_roles,
            admin_role,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}
