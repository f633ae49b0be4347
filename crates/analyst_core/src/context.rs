//! Schema/context aggregation: the textual bundle that fronts every prompt.
//!
//! Built once per table selection and memoized by arguments, so repeated
//! calls return byte-identical output without touching the warehouse again.

use crate::error::Result;
use crate::warehouse::{cell_text, TableData, Warehouse};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Top frequent values of one non-numeric column, table identity preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentValues {
    pub table: String,
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableContext {
    pub name: String,
    /// Schema-derived description text (columns, types, row count).
    pub description: String,
    /// Full row sample at the configured sample size.
    pub sample: TableData,
    /// Three-row display sample used in prompts.
    pub display_sample: TableData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub tables: Vec<TableContext>,
    pub frequent_values: Vec<FrequentValues>,
    /// Concatenated per-table description text.
    pub dictionary: String,
}

impl ContextBundle {
    /// The prompt fed to SQL synthesis: question first, then the dictionary,
    /// display samples, and frequent values.
    pub fn to_prompt(&self, question: &str) -> String {
        let mut samples = String::new();
        for t in &self.tables {
            samples.push_str(&format!("Table: {}\n{}\n", t.name, t.display_sample.to_text()));
        }
        let mut freq = String::new();
        for f in &self.frequent_values {
            freq.push_str(&format!(
                "{}.{}: {}\n",
                f.table,
                f.column,
                f.values.join(", ")
            ));
        }
        format!(
            "Business Question: {question}\n\
             Data Dictionary: \n{dict}\n\
             Data Sample: \n{samples}\n\
             Frequent Values: \n{freq}",
            dict = self.dictionary,
        )
    }
}

type CacheKey = (Vec<String>, usize);

pub struct ContextAggregator {
    warehouse: Arc<dyn Warehouse>,
    sample_rows: usize,
    cache: Mutex<HashMap<CacheKey, Arc<ContextBundle>>>,
}

impl ContextAggregator {
    pub fn new(warehouse: Arc<dyn Warehouse>, sample_rows: usize) -> Self {
        Self { warehouse, sample_rows, cache: Mutex::new(HashMap::new()) }
    }

    /// Build (or return the memoized) bundle for a table selection. A
    /// warehouse failure for one table is a hard failure of aggregation for
    /// that table only: it is logged and the bundle carries a gap.
    pub fn build(&self, tables: &[String]) -> Arc<ContextBundle> {
        let key: CacheKey = (tables.to_vec(), self.sample_rows);
        if let Some(hit) = self.cache.lock().get(&key) {
            return Arc::clone(hit);
        }

        let mut out = ContextBundle {
            tables: vec![],
            frequent_values: vec![],
            dictionary: String::new(),
        };
        for table in tables {
            match self.build_table(table) {
                Ok((ctx, freq)) => {
                    out.dictionary.push_str(&ctx.description);
                    out.tables.push(ctx);
                    out.frequent_values.extend(freq);
                }
                Err(e) => {
                    warn!(table = %table, error = %e, "context aggregation failed for table; continuing with a gap");
                }
            }
        }

        let bundle = Arc::new(out);
        self.cache.lock().insert(key, Arc::clone(&bundle));
        bundle
    }

    fn build_table(&self, table: &str) -> Result<(TableContext, Vec<FrequentValues>)> {
        let description = self.describe_table(table)?;
        let sample = self.warehouse.query(&format!(
            "SELECT * FROM \"{table}\" USING SAMPLE {} ROWS",
            self.sample_rows
        ))?;
        let display_sample = sample.head(3);
        let freq = top_frequent_values(table, &sample, 10);
        Ok((
            TableContext {
                name: table.to_string(),
                description,
                sample,
                display_sample,
            },
            freq,
        ))
    }

    fn describe_table(&self, table: &str) -> Result<String> {
        let columns = self.warehouse.query(&format!(
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_name = '{table}' ORDER BY ordinal_position"
        ))?;
        let mut description = format!("Table: {table}\n");
        match self.warehouse.query(&format!("SELECT COUNT(*) FROM \"{table}\"")) {
            Ok(count) => {
                let n = count
                    .rows
                    .first()
                    .and_then(|r| r.first())
                    .map(cell_text)
                    .unwrap_or_else(|| "unknown".into());
                description.push_str(&format!(" Row Count: {n}\n"));
            }
            Err(e) => {
                warn!(table = %table, error = %e, "row count unavailable");
                description.push_str(" Row Count: unknown\n");
            }
        }
        for row in &columns.rows {
            let name = row.first().map(cell_text).unwrap_or_default();
            let dtype = row.get(1).map(cell_text).unwrap_or_default();
            let nullable = row.get(2).map(cell_text).unwrap_or_default();
            description.push_str(&format!(
                " Column: \"{name}\", Type: {dtype}, Nullable: {nullable}\n"
            ));
        }
        description.push_str("---------------------------------------------------------------\n");
        Ok(description)
    }
}

/// Top `limit` most frequent values for every non-numeric column, coerced to
/// text. Ties break by value so repeated runs order identically.
pub fn top_frequent_values(table: &str, data: &TableData, limit: usize) -> Vec<FrequentValues> {
    let mut out = vec![];
    for (idx, column) in data.columns.iter().enumerate() {
        if data.is_numeric_column(idx) {
            continue;
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for row in &data.rows {
            match row.get(idx) {
                Some(serde_json::Value::Null) | None => {}
                Some(v) => *counts.entry(cell_text(v)).or_default() += 1,
            }
        }
        if counts.is_empty() {
            continue;
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out.push(FrequentValues {
            table: table.to_string(),
            column: column.clone(),
            values: ranked.into_iter().take(limit).map(|(v, _)| v).collect(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalystError;
    use serde_json::json;
    use std::collections::VecDeque;

    struct CountingWarehouse {
        responses: Mutex<VecDeque<TableData>>,
        calls: Mutex<usize>,
    }

    impl Warehouse for CountingWarehouse {
        fn query(&self, _sql: &str) -> Result<TableData> {
            *self.calls.lock() += 1;
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| AnalystError::Warehouse("script exhausted".into()))
        }
    }

    fn sample_table() -> TableData {
        TableData::new(
            vec!["REGION".into(), "AMOUNT".into()],
            vec![
                vec![json!("east"), json!(10)],
                vec![json!("west"), json!(20)],
                vec![json!("east"), json!(5)],
                vec![json!("north"), json!(1)],
            ],
        )
    }

    #[test]
    fn frequent_values_rank_by_count_then_value() {
        let freq = top_frequent_values("SALES", &sample_table(), 10);
        assert_eq!(freq.len(), 1);
        assert_eq!(freq[0].table, "SALES");
        assert_eq!(freq[0].column, "REGION");
        assert_eq!(freq[0].values, vec!["east", "north", "west"]);
    }

    #[test]
    fn frequent_values_coerce_to_text_and_respect_limit() {
        let data = TableData::new(
            vec!["FLAG".into()],
            vec![
                vec![json!(true)],
                vec![json!(true)],
                vec![json!(false)],
                vec![serde_json::Value::Null],
            ],
        );
        let freq = top_frequent_values("T", &data, 1);
        assert_eq!(freq[0].values, vec!["true"]);
    }

    #[test]
    fn build_is_memoized_and_byte_identical() {
        let responses = VecDeque::from(vec![
            // describe: columns, then count
            TableData::new(
                vec!["COLUMN_NAME".into(), "DATA_TYPE".into(), "IS_NULLABLE".into()],
                vec![vec![json!("REGION"), json!("VARCHAR"), json!("YES")]],
            ),
            TableData::new(vec!["COUNT(*)".into()], vec![vec![json!(4)]]),
            sample_table(),
        ]);
        let wh = Arc::new(CountingWarehouse {
            responses: Mutex::new(responses),
            calls: Mutex::new(0),
        });
        let agg = ContextAggregator::new(wh.clone(), 1000);

        let first = agg.build(&["SALES".into()]);
        let calls_after_first = *wh.calls.lock();
        let second = agg.build(&["SALES".into()]);

        assert_eq!(*wh.calls.lock(), calls_after_first, "second build must not re-query");
        assert_eq!(first.to_prompt("q"), second.to_prompt("q"));
        assert!(first.dictionary.contains("Table: SALES"));
        assert!(first.dictionary.contains("Row Count: 4"));
    }

    #[test]
    fn failed_table_leaves_a_gap() {
        let wh = Arc::new(CountingWarehouse {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
        });
        let agg = ContextAggregator::new(wh, 1000);
        let bundle = agg.build(&["MISSING".into()]);
        assert!(bundle.tables.is_empty());
        assert!(bundle.dictionary.is_empty());
    }
}
