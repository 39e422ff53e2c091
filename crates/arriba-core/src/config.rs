//! Crawler configuration.
//!
//! Defaults target the organizers' public task page; every field can be
//! overridden from the environment (`ARRIBA_*`).

use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.equipeorganizadoraf5.com.br";
pub const DEFAULT_PAGE_PATH: &str = "gincanas/2";
pub const DEFAULT_READINESS_MARKER: &str = "Tarefas";
pub const DEFAULT_ROW_SELECTOR: &str = ".table-tasks tbody tr";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub base_url: Url,
    pub page_path: String,
    pub readiness_marker: String,
    pub row_selector: String,
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    #[serde(with = "secs")]
    pub ready_timeout: Duration,
    pub max_concurrency: usize,
    /// Pre-provisioned identifier notifications are sent to.
    pub destination: Option<String>,
    /// Prefix for the task link; falls back to `base_url`.
    pub link_base: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            page_path: DEFAULT_PAGE_PATH.to_string(),
            readiness_marker: DEFAULT_READINESS_MARKER.to_string(),
            row_selector: DEFAULT_ROW_SELECTOR.to_string(),
            poll_interval: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(60),
            max_concurrency: 8,
            destination: None,
            link_base: None,
        }
    }
}

impl CrawlerConfig {
    /// Load from `ARRIBA_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`CrawlerConfig::from_env`] with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("ARRIBA_BASE_URL") {
            config.base_url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                var: "ARRIBA_BASE_URL",
                message: e.to_string(),
            })?;
        }
        if let Some(raw) = lookup("ARRIBA_PAGE_PATH") {
            config.page_path = raw;
        }
        if let Some(raw) = lookup("ARRIBA_READY_MARKER") {
            config.readiness_marker = raw;
        }
        if let Some(raw) = lookup("ARRIBA_ROW_SELECTOR") {
            config.row_selector = raw;
        }
        if let Some(raw) = lookup("ARRIBA_POLL_INTERVAL_SECS") {
            config.poll_interval = parse_secs("ARRIBA_POLL_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("ARRIBA_READY_TIMEOUT_SECS") {
            config.ready_timeout = parse_secs("ARRIBA_READY_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("ARRIBA_MAX_CONCURRENCY") {
            config.max_concurrency = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "ARRIBA_MAX_CONCURRENCY",
                message: format!("{raw:?} is not a positive integer"),
            })?;
        }
        config.destination = lookup("ARRIBA_DESTINATION").or(config.destination);
        config.link_base = lookup("ARRIBA_LINK_BASE").or(config.link_base);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "ARRIBA_POLL_INTERVAL_SECS",
                message: "must be greater than zero".into(),
            });
        }
        if self.ready_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "ARRIBA_READY_TIMEOUT_SECS",
                message: "must be greater than zero".into(),
            });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "ARRIBA_MAX_CONCURRENCY",
                message: "must be greater than zero".into(),
            });
        }
        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                var: "ARRIBA_BASE_URL",
                message: format!("{} cannot be used as a base url", self.base_url),
            });
        }
        Ok(())
    }

    /// Absolute URL of the task page.
    pub fn page_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.page_path)
    }

    /// Prefix joined with a task's `pdf_path` to build the message link.
    pub fn link_base(&self) -> String {
        match &self.link_base {
            Some(base) => base.clone(),
            // Url は末尾に "/" を付けるので、pdf_path の先頭 "/" と重ならないよう落とす
            None => self.base_url.as_str().trim_end_matches('/').to_string(),
        }
    }
}

fn parse_secs(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::Invalid {
            var,
            message: format!("{raw:?} is not a number of seconds"),
        })
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_task_page() {
        let config = CrawlerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(
            config.page_url().unwrap().as_str(),
            "https://www.equipeorganizadoraf5.com.br/gincanas/2"
        );
        assert_eq!(config.readiness_marker, "Tarefas");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.link_base(), "https://www.equipeorganizadoraf5.com.br");
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = CrawlerConfig::from_lookup(lookup(&[
            ("ARRIBA_BASE_URL", "http://localhost:8080/"),
            ("ARRIBA_PAGE_PATH", "list"),
            ("ARRIBA_POLL_INTERVAL_SECS", "0.5"),
            ("ARRIBA_READY_TIMEOUT_SECS", "10"),
            ("ARRIBA_MAX_CONCURRENCY", "2"),
            ("ARRIBA_DESTINATION", "group-1"),
            ("ARRIBA_LINK_BASE", "https://files.test"),
        ]))
        .unwrap();

        assert_eq!(config.page_url().unwrap().as_str(), "http://localhost:8080/list");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.ready_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.destination.as_deref(), Some("group-1"));
        assert_eq!(config.link_base(), "https://files.test");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = CrawlerConfig::from_lookup(lookup(&[("ARRIBA_MAX_CONCURRENCY", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("ARRIBA_MAX_CONCURRENCY"));
    }

    #[rstest]
    #[case::words("soon")]
    #[case::negative("-1")]
    #[case::not_a_number("NaN")]
    #[case::infinite("inf")]
    #[case::too_large("1e20")]
    fn garbage_duration_is_rejected(#[case] raw: &str) {
        let err = CrawlerConfig::from_lookup(lookup(&[("ARRIBA_READY_TIMEOUT_SECS", raw)]))
            .unwrap_err();
        assert!(err.to_string().contains("ARRIBA_READY_TIMEOUT_SECS"));
    }

    #[test]
    fn oversized_json_duration_is_rejected() {
        assert!(serde_json::from_str::<CrawlerConfig>(r#"{"poll_interval": 1e20}"#).is_err());
    }

    #[test]
    fn deserializes_from_json_with_defaults() {
        let config: CrawlerConfig =
            serde_json::from_str(r#"{"ready_timeout": 5, "destination": "x"}"#).unwrap();
        assert_eq!(config.ready_timeout, Duration::from_secs(5));
        assert_eq!(config.row_selector, DEFAULT_ROW_SELECTOR);
    }
}
