use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalystError>;

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("generation service error: {0}")]
    Generation(String),

    #[error("no fenced code block in generation response")]
    EmptyExtraction,

    #[error("warehouse error: {0}")]
    Warehouse(String),

    #[error("the query returned an empty result")]
    EmptyResult,

    #[error("chart spec error: {0}")]
    ChartSpec(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<duckdb::Error> for AnalystError {
    fn from(e: duckdb::Error) -> Self {
        AnalystError::Warehouse(e.to_string())
    }
}
