//! The code/query synthesizer boundary: a trait over the hosted generation
//! service plus fenced-block extraction of its free-text responses.

use crate::error::{AnalystError, Result};
use crate::prompts::preamble;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;

/// What the generation service is being asked to produce. Selects the fixed
/// instructional preamble and the deployment the request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Sql,
    ChartSpec,
    Analysis,
    TableSummary,
    SuggestQuestion,
    DataDictionary,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// One synthesis call: preamble for `kind` plus the free-text prompt.
    /// Returns the raw response text; callers extract fenced blocks as
    /// needed. The service never validates what it returns.
    async fn generate(&self, kind: ArtifactKind, prompt: &str) -> Result<String>;
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_]+)?\n(.*?)```").expect("fence regex"));

/// Extract every fenced block (optionally language-tagged) from a response
/// and join the matches with a blank line. Zero fences yields an empty
/// string; downstream execution treats that as a retryable failure.
pub fn extract_fenced(text: &str) -> String {
    FENCE_RE
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Client for a hosted prediction server. Each artifact kind maps to a
/// deployment id; a request posts one record of system prompt plus prompt
/// text and the response carries the prediction under `data[0].prediction`.
pub struct HttpGenerator {
    client: reqwest::Client,
    server: String,
    api_key: String,
    service_key: Option<String>,
    deployments: crate::config::Deployments,
}

impl HttpGenerator {
    pub fn new(config: &crate::config::AnalystConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            server: config.prediction_server.clone(),
            api_key: config.api_key.clone(),
            service_key: config.service_key.clone(),
            deployments: config.deployments.clone(),
        }
    }

    fn deployment_id(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Sql => &self.deployments.sql,
            ArtifactKind::ChartSpec => &self.deployments.charts,
            ArtifactKind::Analysis => &self.deployments.analysis,
            ArtifactKind::TableSummary => &self.deployments.summary,
            ArtifactKind::SuggestQuestion => &self.deployments.suggest,
            ArtifactKind::DataDictionary => &self.deployments.dictionary,
        }
    }
}

#[async_trait]
impl GenerationService for HttpGenerator {
    async fn generate(&self, kind: ArtifactKind, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/predApi/v1.0/deployments/{}/predictions",
            self.server.trim_end_matches('/'),
            self.deployment_id(kind)
        );
        let body = json!([{ "systemPrompt": preamble(kind), "promptText": prompt }]);

        let mut req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body);
        if let Some(key) = &self.service_key {
            req = req.header("x-service-key", key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(AnalystError::Generation(format!("{status}: {txt}")));
        }
        let v: serde_json::Value = resp.json().await?;
        v.pointer("/data/0/prediction")
            .and_then(|p| p.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                AnalystError::Generation("response missing data[0].prediction".into())
            })
    }
}
