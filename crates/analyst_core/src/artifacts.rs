//! Concurrent artifact generation: two tasks on the shared runtime, one for
//! the chart pair and one for the analysis text. Both run the same bounded
//! retry-with-feedback contract; their failures are isolated from each
//! other, and a cancellation token stops work whose join has timed out.

use crate::charts::{evaluate, parse_chart_pair, Chart};
use crate::error::AnalystError;
use crate::generate::{extract_fenced, ArtifactKind, GenerationService};
use crate::warehouse::TableData;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const ANALYSIS_FALLBACK: &str =
    "I am unable to provide the analysis. Please rephrase the question and try again.";
pub const CHARTS_UNAVAILABLE: &str = "I was unable to plot the data.";

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub chart_max_attempts: usize,
    pub analysis_max_attempts: usize,
    /// Bound on the join with the analysis task.
    pub analysis_timeout: Duration,
    /// Bound on each individual generation call.
    pub attempt_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ChartOutcome {
    /// Both figures, or None when the bound was exhausted.
    pub charts: Option<(Chart, Chart)>,
    pub attempts: usize,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub chart: ChartOutcome,
    pub analysis: Option<String>,
}

impl ArtifactSet {
    pub fn analysis_or_fallback(&self) -> &str {
        self.analysis.as_deref().unwrap_or(ANALYSIS_FALLBACK)
    }
}

/// Fan out the chart and analysis tasks and join them. The join waits for
/// the chart task to reach a terminal state (its bound guarantees one), then
/// separately waits on the analysis task under `analysis_timeout`; a timed
/// out analysis task is cancelled rather than left running.
pub async fn generate_artifacts(
    generator: Arc<dyn GenerationService>,
    question: &str,
    table: &TableData,
    prompt: &str,
    config: &ArtifactConfig,
    cancel: CancellationToken,
) -> ArtifactSet {
    let chart_prompt = format!("{question}\n{}", table.to_text());
    let analysis_prompt = format!("{prompt}\n{}", table.to_text());

    let chart_handle = tokio::spawn(chart_task(
        Arc::clone(&generator),
        chart_prompt,
        table.clone(),
        config.chart_max_attempts,
        config.attempt_timeout,
        cancel.child_token(),
    ));
    let analysis_cancel = cancel.child_token();
    let analysis_handle = tokio::spawn(analysis_task(
        generator,
        analysis_prompt,
        config.analysis_max_attempts,
        config.attempt_timeout,
        analysis_cancel.clone(),
    ));

    let chart = match chart_handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "chart task aborted");
            ChartOutcome { charts: None, attempts: 0, last_error: Some(e.to_string()) }
        }
    };

    let analysis = match tokio::time::timeout(config.analysis_timeout, analysis_handle).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "analysis task aborted");
            None
        }
        Err(_) => {
            analysis_cancel.cancel();
            warn!(timeout = ?config.analysis_timeout, "analysis timed out; task cancelled");
            None
        }
    };

    ArtifactSet { chart, analysis }
}

async fn chart_task(
    generator: Arc<dyn GenerationService>,
    prompt: String,
    table: TableData,
    max_attempts: usize,
    attempt_timeout: Duration,
    cancel: CancellationToken,
) -> ChartOutcome {
    let mut trail = prompt;
    let mut fig1: Option<Chart> = None;
    let mut fig2: Option<Chart> = None;
    let mut attempts = 0usize;
    let mut last_error: Option<String> = None;

    while attempts < max_attempts {
        if cancel.is_cancelled() {
            break;
        }
        attempts += 1;

        let response = tokio::select! {
            _ = cancel.cancelled() => break,
            r = tokio::time::timeout(
                attempt_timeout,
                generator.generate(ArtifactKind::ChartSpec, &trail),
            ) => match r {
                Ok(inner) => inner,
                Err(_) => Err(AnalystError::Timeout(attempt_timeout)),
            },
        };

        let error = match response {
            Err(e) => e.to_string(),
            Ok(text) => match parse_chart_pair(&extract_fenced(&text)) {
                Err(e) => e.to_string(),
                Ok((spec1, spec2)) => {
                    let c1 = evaluate(&spec1, &table);
                    let c2 = evaluate(&spec2, &table);
                    // Keep whatever validated; partial figures feed the
                    // next attempt's feedback.
                    if let Ok(c) = &c1 {
                        fig1 = Some(c.clone());
                    }
                    if let Ok(c) = &c2 {
                        fig2 = Some(c.clone());
                    }
                    match (c1, c2) {
                        (Ok(a), Ok(b)) => {
                            return ChartOutcome {
                                charts: Some((a, b)),
                                attempts,
                                last_error: None,
                            };
                        }
                        (Err(e), _) | (_, Err(e)) => e.to_string(),
                    }
                }
            },
        };

        warn!(attempt = attempts, error = %error, "chart attempt failed");
        let fig1_text = snapshot(&fig1);
        let fig2_text = snapshot(&fig2);
        trail.push_str(&format!(
            "\nCHART FAILED! Attempt {attempts} failed with error: {error}\nFig1: {fig1_text}\nFig2: {fig2_text}"
        ));
        last_error = Some(error);
    }

    ChartOutcome { charts: None, attempts, last_error }
}

fn snapshot(fig: &Option<Chart>) -> String {
    match fig {
        Some(c) => serde_json::to_string(&c.spec).unwrap_or_else(|_| "None".into()),
        None => "None".into(),
    }
}

async fn analysis_task(
    generator: Arc<dyn GenerationService>,
    prompt: String,
    max_attempts: usize,
    attempt_timeout: Duration,
    cancel: CancellationToken,
) -> Option<String> {
    let mut trail = prompt;
    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return None;
        }
        let response = tokio::select! {
            _ = cancel.cancelled() => return None,
            r = tokio::time::timeout(
                attempt_timeout,
                generator.generate(ArtifactKind::Analysis, &trail),
            ) => match r {
                Ok(inner) => inner,
                Err(_) => Err(AnalystError::Timeout(attempt_timeout)),
            },
        };

        let error = match response {
            Ok(text) if !text.trim().is_empty() => return Some(text),
            Ok(_) => "empty analysis response".to_string(),
            Err(e) => e.to_string(),
        };
        warn!(attempt, error = %error, "analysis attempt failed");
        trail.push_str(&format!(
            "\nANALYSIS FAILED! Attempt {attempt} failed with error: {error}"
        ));
    }
    None
}
