//! Destination settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_max_rows_per_insert() -> usize {
    500
}

fn default_query_timeout_secs() -> u64 {
    60
}

/// Where and how to write in BigQuery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigQueryConfig {
    pub project_id: String,
    pub dataset_id: String,

    /// Dataset location, e.g. `US` or `europe-west3`
    #[serde(default)]
    pub location: Option<String>,

    /// Service account key file. Application Default Credentials are used
    /// when unset.
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    #[serde(default = "default_max_rows_per_insert")]
    pub max_rows_per_insert: usize,

    /// How long a single query call waits for its job before polling.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl BigQueryConfig {
    pub fn new(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            location: None,
            credentials_file: None,
            max_rows_per_insert: default_max_rows_per_insert(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project_id.trim().is_empty() {
            anyhow::bail!("destination.project_id must not be empty");
        }
        if self.dataset_id.trim().is_empty() {
            anyhow::bail!("destination.dataset_id must not be empty");
        }
        if self.max_rows_per_insert == 0 {
            anyhow::bail!("destination.max_rows_per_insert must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_yaml() {
        let config: BigQueryConfig =
            serde_yaml::from_str("project_id: acme-analytics\ndataset_id: raw_shop\n").unwrap();
        assert_eq!(config, BigQueryConfig::new("acme-analytics", "raw_shop"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_dataset() {
        let mut config = BigQueryConfig::new("acme-analytics", " ");
        assert!(config.validate().is_err());
        config.dataset_id = "raw".into();
        config.max_rows_per_insert = 0;
        assert!(config.validate().is_err());
    }
}
