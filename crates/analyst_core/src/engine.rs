//! Execution engine: a bounded generate/execute loop over the synthesizer
//! and the warehouse. Generation and execution are coupled per attempt — a
//! malformed query is repaired by resynthesizing with the error appended to
//! the prompt, not by retrying the same SQL verbatim.

use crate::error::AnalystError;
use crate::generate::{extract_fenced, ArtifactKind, GenerationService};
use crate::warehouse::{TableData, Warehouse};
use tracing::{info, warn};

/// Terminal state of one engine run. Exhausting the bound is not an error:
/// the last attempt's (possibly empty or absent) result is surfaced and the
/// absence of non-empty data is the only terminal signal.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// SQL of the last attempt that produced any, empty if none did.
    pub sql: String,
    /// Last attempt's tabular result, if execution got that far.
    pub table: Option<TableData>,
    pub attempts: usize,
    pub last_error: Option<String>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.table.as_ref().map(|t| !t.is_empty()).unwrap_or(false)
    }
}

/// Run the retry loop. The caller's prompt is copied into a private retry
/// trail; concurrent callers never share one.
#[tracing::instrument(skip(generator, warehouse, prompt))]
pub async fn execute_with_retry(
    generator: &dyn GenerationService,
    warehouse: &dyn Warehouse,
    prompt: &str,
    max_attempts: usize,
) -> ExecutionOutcome {
    let mut trail = prompt.to_string();
    let mut attempts = 0usize;
    let mut last_sql = String::new();
    let mut last_table: Option<TableData> = None;
    let mut last_error: Option<String> = None;

    while attempts < max_attempts {
        attempts += 1;

        let mut sql_text = "None".to_string();
        let error = match generator.generate(ArtifactKind::Sql, &trail).await {
            Err(e) => e.to_string(),
            Ok(response) => {
                let extracted = extract_fenced(&response);
                if extracted.is_empty() {
                    // Nothing runnable; fail the attempt without touching
                    // the warehouse.
                    AnalystError::EmptyExtraction.to_string()
                } else {
                    sql_text = extracted.clone();
                    last_sql = extracted.clone();
                    // One connection per attempt, closed inside query().
                    match warehouse.query(&extracted) {
                        Ok(table) if !table.is_empty() => {
                            info!(attempt = attempts, "query succeeded");
                            return ExecutionOutcome {
                                sql: last_sql,
                                table: Some(table),
                                attempts,
                                last_error: None,
                            };
                        }
                        Ok(table) => {
                            last_table = Some(table);
                            AnalystError::EmptyResult.to_string()
                        }
                        Err(e) => {
                            last_table = None;
                            e.to_string()
                        }
                    }
                }
            }
        };

        warn!(attempt = attempts, error = %error, "query attempt failed");
        trail.push_str(&format!(
            "\nQUERY FAILED! Attempt {attempts} failed with error: {error}\nSQL Code: {sql_text}"
        ));
        last_error = Some(error);
    }

    ExecutionOutcome { sql: last_sql, table: last_table, attempts, last_error }
}
