//! Client configuration
//!
//! Connection settings come from the environment, optionally seeded from a
//! `.env` file. Tunable dashboard heuristics come from an optional JSON file
//! deserialized into [`DashboardConfig`].

use core::time::Duration;
use std::path::Path;

use joysense_core::config::DashboardConfig;
use log::{debug, info};

use crate::error::{ClientError, ClientResult};

pub const API_URL_VAR: &str = "JOYSENSE_API_URL";
pub const SCHEMA_VAR: &str = "JOYSENSE_SCHEMA";
pub const TIMEOUT_VAR: &str = "JOYSENSE_TIMEOUT_SECS";
pub const CACHE_TTL_VAR: &str = "JOYSENSE_CACHE_TTL_SECS";

const DEFAULT_API_URL: &str = "http://localhost:3001";
const DEFAULT_SCHEMA: &str = "sense";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, without the `/api` suffix
    pub base_url: String,
    /// Database schema every request is routed to
    pub schema: String,
    pub timeout: Duration,
    /// Overrides the dashboard config's cache lifetime when set
    pub cache_ttl: Option<Duration>,
}

impl ClientConfig {
    /// Read the process environment after loading `.env`, if present
    pub fn from_env() -> ClientResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let base_url = lookup(API_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let schema = lookup(SCHEMA_VAR)
            .filter(|schema| !schema.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());

        let timeout = seconds(&lookup, TIMEOUT_VAR)?
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let cache_ttl = seconds(&lookup, CACHE_TTL_VAR)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            schema,
            timeout,
            cache_ttl,
        })
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> ClientResult<Option<Duration>> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|e| ClientError::Env {
            var,
            message: format!("{raw:?} is not a number of seconds ({e})"),
        })
}

/// Load and validate dashboard heuristics, falling back to the defaults when
/// no file is given
pub fn load_dashboard_config(path: Option<&Path>) -> ClientResult<DashboardConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let config: DashboardConfig = serde_json::from_str(&raw)?;
            info!("Loaded dashboard config from {}", path.display());
            config
        }
        None => DashboardConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.schema, "sense");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.cache_ttl, None);
    }

    #[test]
    fn test_reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_VAR, "https://joysense.example/"),
            (SCHEMA_VAR, "joysense"),
            (TIMEOUT_VAR, "5"),
            (CACHE_TTL_VAR, "60"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://joysense.example", "trailing slash trimmed");
        assert_eq!(config.schema, "joysense");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let err = ClientConfig::from_lookup(lookup(&[(TIMEOUT_VAR, "soon")])).unwrap_err();
        assert!(matches!(err, ClientError::Env { var: TIMEOUT_VAR, .. }));
    }

    #[test]
    fn test_default_dashboard_config_is_valid() {
        let config = load_dashboard_config(None).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }
}
