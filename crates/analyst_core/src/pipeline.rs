//! Pipeline orchestration. Intermediates live in an explicit immutable
//! context value passed stage to stage; stages return new values instead of
//! mutating shared session state, so each one tests on its own.

use crate::artifacts::{generate_artifacts, ArtifactConfig};
use crate::charts::Chart;
use crate::config::AnalystConfig;
use crate::context::{ContextAggregator, ContextBundle};
use crate::engine::execute_with_retry;
use crate::error::Result;
use crate::generate::{ArtifactKind, GenerationService};
use crate::report::{download_link, render_html, ReportInput, REPORT_FILENAME};
use crate::warehouse::{TableData, Warehouse};
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Everything one question run needs, built once and then only read.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub question: String,
    pub bundle: Arc<ContextBundle>,
    pub prompt: String,
}

impl PipelineContext {
    pub fn new(question: &str, bundle: Arc<ContextBundle>) -> Self {
        let prompt = bundle.to_prompt(question);
        Self { question: question.to_string(), bundle, prompt }
    }
}

/// Terminal state of one question run. `is_success` false means the engine
/// exhausted its bound; the artifacts and report are then absent.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub id: String,
    pub question: String,
    pub sql: String,
    pub table: Option<TableData>,
    pub attempts: usize,
    pub last_error: Option<String>,
    pub charts: Option<(Chart, Chart)>,
    pub analysis: Option<String>,
    pub report_html: Option<String>,
    pub download_link: Option<String>,
    pub run_dir: Option<PathBuf>,
}

impl AnalysisRun {
    pub fn is_success(&self) -> bool {
        self.table.as_ref().map(|t| !t.is_empty()).unwrap_or(false)
    }
}

pub struct Analyst {
    config: AnalystConfig,
    generator: Arc<dyn GenerationService>,
    warehouse: Arc<dyn Warehouse>,
    aggregator: ContextAggregator,
}

impl Analyst {
    pub fn new(
        config: AnalystConfig,
        generator: Arc<dyn GenerationService>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        let aggregator = ContextAggregator::new(Arc::clone(&warehouse), config.sample_rows);
        Self { config, generator, warehouse, aggregator }
    }

    /// Run the full pipeline for one question: context, retried SQL
    /// execution, concurrent artifacts, report. Engine exhaustion is not an
    /// error; the returned run simply has no data and no report.
    #[tracing::instrument(skip_all, fields(question = %question))]
    pub async fn run_question(&self, question: &str, tables: &[String]) -> Result<AnalysisRun> {
        let bundle = self.aggregator.build(tables);
        let ctx = PipelineContext::new(question, bundle);

        let outcome = execute_with_retry(
            self.generator.as_ref(),
            self.warehouse.as_ref(),
            &ctx.prompt,
            self.config.sql_max_attempts,
        )
        .await;

        let mut run = AnalysisRun {
            id: Uuid::new_v4().to_string(),
            question: ctx.question.clone(),
            sql: outcome.sql.clone(),
            table: outcome.table.clone(),
            attempts: outcome.attempts,
            last_error: outcome.last_error.clone(),
            charts: None,
            analysis: None,
            report_html: None,
            download_link: None,
            run_dir: None,
        };

        let table = match outcome.table {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(run),
        };

        let artifact_config = ArtifactConfig {
            chart_max_attempts: self.config.chart_max_attempts,
            analysis_max_attempts: self.config.analysis_max_attempts,
            analysis_timeout: self.config.analysis_timeout,
            attempt_timeout: self.config.attempt_timeout,
        };
        let artifacts = generate_artifacts(
            Arc::clone(&self.generator),
            &ctx.question,
            &table,
            &ctx.prompt,
            &artifact_config,
            CancellationToken::new(),
        )
        .await;

        let analysis = artifacts.analysis_or_fallback().to_string();
        let html = render_html(&ReportInput {
            question: &ctx.question,
            sql: &run.sql,
            table: &table,
            charts: artifacts.chart.charts.as_ref(),
            analysis: &analysis,
        });
        run.download_link = Some(download_link(&html, REPORT_FILENAME));
        run.charts = artifacts.chart.charts;
        run.analysis = Some(analysis);
        run.report_html = Some(html);

        self.persist_run(&mut run)?;
        Ok(run)
    }

    /// One generation call suggesting a question to ask of the selection.
    pub async fn suggest_question(&self, tables: &[String]) -> Result<String> {
        let bundle = self.aggregator.build(tables);
        self.generator
            .generate(ArtifactKind::SuggestQuestion, &bundle.dictionary)
            .await
    }

    /// Natural-language description of one table, from its dictionary text.
    pub async fn summarize_table(&self, table: &str) -> Result<String> {
        let bundle = self.aggregator.build(&[table.to_string()]);
        let prompt = format!("{}\nTABLE TO DESCRIBE: {table}", bundle.dictionary);
        self.generator.generate(ArtifactKind::TableSummary, &prompt).await
    }

    fn runs_root(&self) -> Result<PathBuf> {
        match &self.config.runs_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                Ok(root.clone())
            }
            None => crate::util::default_runs_root(),
        }
    }

    fn persist_run(&self, run: &mut AnalysisRun) -> Result<()> {
        let dir = self.runs_root()?.join(&run.id);
        std::fs::create_dir_all(&dir)?;
        if let Some(html) = &run.report_html {
            std::fs::write(dir.join(REPORT_FILENAME), html)?;
        }
        let manifest = json!({
            "id": run.id,
            "question": run.question,
            "sql": run.sql,
            "attempts": run.attempts,
            "charts_available": run.charts.is_some(),
            "analysis_available": run.analysis.is_some(),
            "created_at": Utc::now().to_rfc3339(),
        });
        std::fs::write(dir.join("manifest.json"), serde_json::to_vec_pretty(&manifest)?)?;
        info!(run_id = %run.id, dir = %dir.display(), "run persisted");
        run.run_dir = Some(dir);
        Ok(())
    }

    /// Most recent run directories, newest first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<PathBuf>> {
        let root = self.runs_root()?;
        let mut runs = vec![];
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                runs.push(entry.path());
            }
        }
        runs.sort_by(|a, b| b.cmp(a));
        runs.truncate(limit);
        Ok(runs)
    }
}
