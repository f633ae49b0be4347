//! Warehouse boundary. The engine opens one connection per execution
//! attempt and closes it before the next; nothing is pooled or reused.

use crate::error::{AnalystError, Result};
use crate::util::html_escape;
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A tabular query result. Column identifiers are upper-cased on the way
/// out of the warehouse; cells are JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn head(&self, n: usize) -> TableData {
        TableData {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// True when every non-null cell of the column is a JSON number and at
    /// least one non-null cell exists.
    pub fn is_numeric_column(&self, index: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            match row.get(index) {
                Some(serde_json::Value::Null) | None => {}
                Some(serde_json::Value::Number(_)) => seen = true,
                Some(_) => return false,
            }
        }
        seen
    }

    /// Plain-text rendering used inside prompts.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.columns.join(" | "));
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        out
    }

    /// HTML table rendering for the report.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<table>\n<thead><tr>");
        for c in &self.columns {
            out.push_str(&format!("<th>{}</th>", html_escape(c)));
        }
        out.push_str("</tr></thead>\n<tbody>\n");
        for row in &self.rows {
            out.push_str("<tr>");
            for cell in row {
                out.push_str(&format!("<td>{}</td>", html_escape(&cell_text(cell))));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>");
        out
    }
}

/// Cells render without JSON string quoting so prompt and report text read
/// like the values themselves.
pub fn cell_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub trait Warehouse: Send + Sync {
    /// Execute a single SQL statement and return its result. Implementations
    /// open and close their connection within this call.
    fn query(&self, sql: &str) -> Result<TableData>;

    fn table_names(&self) -> Result<Vec<String>> {
        let t = self.query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'main' ORDER BY table_name",
        )?;
        Ok(t.rows
            .iter()
            .filter_map(|r| r.first().map(cell_text))
            .collect())
    }
}

/// In-process DuckDB warehouse backed by a database file.
pub struct DuckDbWarehouse {
    db_path: PathBuf,
}

impl DuckDbWarehouse {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { db_path })
    }
}

impl Warehouse for DuckDbWarehouse {
    fn query(&self, sql: &str) -> Result<TableData> {
        let conn = Connection::open(&self.db_path)?;
        let table = run_query(&conn, sql)?;
        // Connection drops here; each attempt pays for its own.
        Ok(table)
    }
}

fn run_query(conn: &Connection, sql: &str) -> Result<TableData> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut out_rows: Vec<Vec<serde_json::Value>> = vec![];
    while let Some(row) = rows.next()? {
        let ncols = row.as_ref().column_count();
        let mut cells = Vec::with_capacity(ncols);
        for i in 0..ncols {
            cells.push(value_ref_to_json(row.get_ref(i)?));
        }
        out_rows.push(cells);
    }
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|c| c.to_uppercase())
        .collect();
    Ok(TableData::new(columns, out_rows))
}

fn value_ref_to_json(v: duckdb::types::ValueRef<'_>) -> serde_json::Value {
    use duckdb::types::ValueRef;
    match v {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => b.into(),
        ValueRef::TinyInt(x) => (x as i64).into(),
        ValueRef::SmallInt(x) => (x as i64).into(),
        ValueRef::Int(x) => (x as i64).into(),
        ValueRef::BigInt(x) => x.into(),
        ValueRef::UTinyInt(x) => (x as u64).into(),
        ValueRef::USmallInt(x) => (x as u64).into(),
        ValueRef::UInt(x) => (x as u64).into(),
        ValueRef::UBigInt(x) => x.into(),
        ValueRef::Float(x) => (x as f64).into(),
        ValueRef::Double(x) => x.into(),
        ValueRef::Text(s) => String::from_utf8_lossy(s).to_string().into(),
        other => serde_json::Value::String(format!("{other:?}")),
    }
}

impl std::fmt::Debug for DuckDbWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbWarehouse").field("db_path", &self.db_path).finish()
    }
}

// Seed or migrate a warehouse file; not part of the Warehouse trait because
// the pipeline only ever reads.
pub fn execute_batch(db_path: &Path, sql: &str) -> Result<()> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(sql).map_err(AnalystError::from)
}
