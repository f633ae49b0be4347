use crate::error::{AnalystError, Result};
use std::{env, path::PathBuf, time::Duration};

/// Deployment identifiers on the prediction server, one per artifact kind.
#[derive(Debug, Clone)]
pub struct Deployments {
    pub sql: String,
    pub charts: String,
    pub analysis: String,
    pub summary: String,
    pub suggest: String,
    pub dictionary: String,
}

impl Default for Deployments {
    fn default() -> Self {
        Self {
            sql: "sql-generator".into(),
            charts: "chart-generator".into(),
            analysis: "business-analysis".into(),
            summary: "table-summary".into(),
            suggest: "question-suggester".into(),
            dictionary: "data-dictionary".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalystConfig {
    /// Base URL of the hosted prediction server.
    pub prediction_server: String,
    /// Bearer token for the prediction server.
    pub api_key: String,
    /// Optional extra service key header some deployments require.
    pub service_key: Option<String>,
    pub deployments: Deployments,

    /// Catalog (data dictionary) endpoint and key, if configured.
    pub catalog_endpoint: Option<String>,
    pub catalog_api_key: Option<String>,

    /// Path of the DuckDB warehouse database file.
    pub warehouse_path: PathBuf,

    /// Rows pulled per table when building the context bundle.
    pub sample_rows: usize,
    /// Bound on generate/execute attempts for SQL.
    pub sql_max_attempts: usize,
    /// Bound on chart generation attempts.
    pub chart_max_attempts: usize,
    /// Bound on analysis generation attempts.
    pub analysis_max_attempts: usize,
    /// How long the join waits for the analysis task.
    pub analysis_timeout: Duration,
    /// Per-attempt timeout on artifact generation calls.
    pub attempt_timeout: Duration,

    /// Override for the runs directory; defaults to the app data dir.
    pub runs_root: Option<PathBuf>,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            prediction_server: String::new(),
            api_key: String::new(),
            service_key: None,
            deployments: Deployments::default(),
            catalog_endpoint: None,
            catalog_api_key: None,
            warehouse_path: PathBuf::from("warehouse.duckdb"),
            sample_rows: 1000,
            sql_max_attempts: 5,
            chart_max_attempts: 6,
            analysis_max_attempts: 1,
            analysis_timeout: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(30),
            runs_root: None,
        }
    }
}

impl AnalystConfig {
    /// Read configuration from `QUARRY_*` environment variables. The CLI
    /// loads `.env` first via dotenvy, so a checked-out workspace only needs
    /// a local env file.
    pub fn from_env() -> Result<Self> {
        let prediction_server = env::var("QUARRY_PREDICTION_SERVER")
            .map_err(|_| AnalystError::Config("QUARRY_PREDICTION_SERVER is not set".into()))?;
        let api_key = env::var("QUARRY_API_KEY")
            .map_err(|_| AnalystError::Config("QUARRY_API_KEY is not set".into()))?;

        let defaults = Deployments::default();
        let deployments = Deployments {
            sql: env_or("QUARRY_DEPLOYMENT_SQL", &defaults.sql),
            charts: env_or("QUARRY_DEPLOYMENT_CHARTS", &defaults.charts),
            analysis: env_or("QUARRY_DEPLOYMENT_ANALYSIS", &defaults.analysis),
            summary: env_or("QUARRY_DEPLOYMENT_SUMMARY", &defaults.summary),
            suggest: env_or("QUARRY_DEPLOYMENT_SUGGEST", &defaults.suggest),
            dictionary: env_or("QUARRY_DEPLOYMENT_DICTIONARY", &defaults.dictionary),
        };

        let warehouse_path = match env::var("QUARRY_WAREHOUSE") {
            Ok(p) => PathBuf::from(p),
            Err(_) => crate::util::app_dirs()?.data_dir().join("warehouse.duckdb"),
        };

        Ok(Self {
            prediction_server,
            api_key,
            service_key: env::var("QUARRY_SERVICE_KEY").ok(),
            deployments,
            catalog_endpoint: env::var("QUARRY_CATALOG_ENDPOINT").ok(),
            catalog_api_key: env::var("QUARRY_CATALOG_API_KEY").ok(),
            warehouse_path,
            sample_rows: env_usize("QUARRY_SAMPLE_ROWS", 1000),
            sql_max_attempts: env_usize("QUARRY_SQL_MAX_ATTEMPTS", 5),
            chart_max_attempts: env_usize("QUARRY_CHART_MAX_ATTEMPTS", 6),
            analysis_max_attempts: env_usize("QUARRY_ANALYSIS_MAX_ATTEMPTS", 1),
            analysis_timeout: Duration::from_secs(env_u64("QUARRY_ANALYSIS_TIMEOUT_SECS", 30)),
            attempt_timeout: Duration::from_secs(env_u64("QUARRY_ATTEMPT_TIMEOUT_SECS", 30)),
            runs_root: env::var("QUARRY_RUNS_DIR").ok().map(PathBuf::from),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
