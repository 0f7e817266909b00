//! Warehouse client configuration.

use std::time::Duration;

use crate::table::TableRef;

pub const DEFAULT_API_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_TABLE_ID: &str = "Partnership_Master_List";

/// BigQuery client configuration.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Project that owns the dataset and is billed for jobs.
    pub project_id: String,

    /// Dataset holding the managed table.
    pub dataset_id: String,

    /// The managed table.
    pub table_id: String,

    /// Job location (e.g. `US`).
    pub location: String,

    /// REST endpoint base, without a trailing slash.
    pub api_base_url: String,

    /// Static OAuth access token. When unset, tokens are fetched from the
    /// GCE metadata server.
    pub access_token: Option<String>,

    /// Per-request HTTP timeout.
    pub timeout: Duration,

    /// How long a single `jobs.query` call waits for completion before the
    /// client falls back to polling.
    pub job_wait: Duration,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset_id: String::new(),
            table_id: DEFAULT_TABLE_ID.to_string(),
            location: "US".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
            job_wait: Duration::from_secs(10),
        }
    }
}

impl WarehouseConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let project_id = std::env::var("GCP_PROJECT_ID").unwrap_or_default();
        let dataset_id = std::env::var("BIGQUERY_DATASET").unwrap_or_default();
        let table_id = std::env::var("PARTNERSHIP_TABLE_ID").unwrap_or(defaults.table_id);
        let location = std::env::var("BIGQUERY_LOCATION").unwrap_or(defaults.location);
        let api_base_url = std::env::var("BIGQUERY_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        let access_token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let timeout = std::env::var("BIGQUERY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            project_id,
            dataset_id,
            table_id,
            location,
            api_base_url,
            access_token,
            timeout,
            ..Default::default()
        }
    }

    /// Reference to the managed table.
    pub fn table(&self) -> TableRef {
        TableRef::new(&self.project_id, &self.dataset_id, &self.table_id)
    }
}
