//! Checker configuration
//!
//! Read from an optional file (any format the `config` crate detects from
//! the extension) with `CHECKER__*` environment variables layered on top,
//! e.g. `CHECKER__HOST_NAME=db01`.

use anyhow::{Context, Result};
use check_lib::Rules;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Checker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    /// Host the agent output belongs to
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// File holding counter state between invocations
    #[serde(default = "default_value_store_path")]
    pub value_store_path: PathBuf,

    /// Check parameters per ruleset name
    #[serde(default)]
    pub rules: Rules,

    /// Discovery parameters per ruleset name
    #[serde(default)]
    pub discovery_rules: Rules,

    /// Reference curves for predictive levels, per metric
    #[serde(default)]
    pub baselines: BTreeMap<String, Vec<f64>>,
}

fn default_host_name() -> String {
    "localhost".to_string()
}

fn default_value_store_path() -> PathBuf {
    PathBuf::from("checker-values.json")
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            host_name: default_host_name(),
            value_store_path: default_value_store_path(),
            rules: Rules::new(),
            discovery_rules: Rules::new(),
            baselines: BTreeMap::new(),
        }
    }
}

impl CheckerConfig {
    /// Load configuration from the environment and an optional file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("CHECKER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_sources() {
        let config = CheckerConfig::default();
        assert_eq!(config.host_name, "localhost");
        assert_eq!(config.value_store_path, PathBuf::from("checker-values.json"));
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checker.json");
        std::fs::write(
            &path,
            r#"{
                "host_name": "db01",
                "value_store_path": "/tmp/db01.json",
                "rules": {"cpu_load": {"levels": {"upper": [1.0, 2.0]}}},
                "baselines": {"util": [10.0, 20.0]}
            }"#,
        )
        .unwrap();

        let config = CheckerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.host_name, "db01");
        assert_eq!(config.value_store_path, PathBuf::from("/tmp/db01.json"));
        assert_eq!(
            config.rules["cpu_load"],
            json!({"levels": {"upper": [1.0, 2.0]}})
        );
        assert_eq!(config.baselines["util"], vec![10.0, 20.0]);
        assert!(config.discovery_rules.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(CheckerConfig::load(Some(&dir.path().join("nope.json"))).is_err());
    }
}
