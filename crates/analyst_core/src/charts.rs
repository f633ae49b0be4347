//! Declarative chart specs and the fixed evaluator that turns them into
//! Vega-Lite payloads. The generation service returns data, never code: a
//! JSON array of exactly two specs, validated against the result columns
//! before rendering. A spec that fails validation is indistinguishable from
//! any other chart failure and feeds the same retry path.

use crate::error::{AnalystError, Result};
use crate::warehouse::TableData;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Area,
    Pie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    /// Category or x-axis column.
    pub x: String,
    /// Value column; must be present in the result table.
    pub y: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A validated spec together with its rendered Vega-Lite document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub spec: ChartSpec,
    pub vega_lite: Value,
}

/// Parse the extracted fence into exactly two chart specs.
pub fn parse_chart_pair(extracted: &str) -> Result<(ChartSpec, ChartSpec)> {
    if extracted.trim().is_empty() {
        return Err(AnalystError::EmptyExtraction);
    }
    let specs: Vec<ChartSpec> = serde_json::from_str(extracted)
        .map_err(|e| AnalystError::ChartSpec(format!("invalid chart spec JSON: {e}")))?;
    match <[ChartSpec; 2]>::try_from(specs) {
        Ok([a, b]) => Ok((a, b)),
        Err(v) => Err(AnalystError::ChartSpec(format!(
            "expected exactly two chart specs, got {}",
            v.len()
        ))),
    }
}

/// Validate a spec against the result table and render it. This is the whole
/// evaluator: column resolution, mark mapping, encoding — nothing generated
/// is ever executed.
pub fn evaluate(spec: &ChartSpec, table: &TableData) -> Result<Chart> {
    let x = resolve_column(table, &spec.x)?;
    let y = resolve_column(table, &spec.y)?;
    let color = spec.color.as_deref().map(|c| resolve_column(table, c)).transpose()?;

    let values: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, col) in table.columns.iter().enumerate() {
                obj.insert(col.clone(), row.get(i).cloned().unwrap_or(Value::Null));
            }
            Value::Object(obj)
        })
        .collect();

    let x_type = if table
        .column_index(&x)
        .map(|i| table.is_numeric_column(i))
        .unwrap_or(false)
    {
        "quantitative"
    } else {
        "nominal"
    };

    let (mark, encoding) = match spec.kind {
        ChartKind::Pie => (
            json!("arc"),
            json!({
                "theta": {"field": y, "type": "quantitative"},
                "color": {"field": x, "type": "nominal"},
            }),
        ),
        kind => {
            let mark = match kind {
                ChartKind::Bar => "bar",
                ChartKind::Line => "line",
                ChartKind::Scatter => "point",
                ChartKind::Area => "area",
                ChartKind::Pie => unreachable!(),
            };
            let mut enc = json!({
                "x": {"field": x, "type": x_type},
                "y": {"field": y, "type": "quantitative"},
            });
            if let Some(c) = &color {
                enc["color"] = json!({"field": c, "type": "nominal"});
            }
            (json!(mark), enc)
        }
    };

    Ok(Chart {
        spec: spec.clone(),
        vega_lite: json!({
            "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
            "title": spec.title,
            "width": "container",
            "data": {"values": values},
            "mark": mark,
            "encoding": encoding,
        }),
    })
}

fn resolve_column(table: &TableData, name: &str) -> Result<String> {
    table
        .columns
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| AnalystError::ChartSpec(format!("unknown column '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> TableData {
        TableData::new(
            vec!["REGION".into(), "AMOUNT".into()],
            vec![
                vec![json!("east"), json!(10)],
                vec![json!("west"), json!(20)],
            ],
        )
    }

    #[test]
    fn parses_a_pair() {
        let (a, b) = parse_chart_pair(
            r#"[{"kind":"bar","title":"t1","x":"REGION","y":"AMOUNT"},
                {"kind":"pie","title":"t2","x":"REGION","y":"AMOUNT"}]"#,
        )
        .unwrap();
        assert_eq!(a.kind, ChartKind::Bar);
        assert_eq!(b.kind, ChartKind::Pie);
    }

    #[test]
    fn rejects_wrong_arity() {
        let err = parse_chart_pair(r#"[{"kind":"bar","title":"t","x":"A","y":"B"}]"#).unwrap_err();
        assert!(err.to_string().contains("exactly two"));
    }

    #[test]
    fn empty_extraction_is_its_own_error() {
        assert!(matches!(parse_chart_pair("  "), Err(AnalystError::EmptyExtraction)));
    }

    #[test]
    fn evaluates_bar_with_case_insensitive_columns() {
        let spec = ChartSpec {
            kind: ChartKind::Bar,
            title: "by region".into(),
            x: "region".into(),
            y: "amount".into(),
            color: None,
        };
        let chart = evaluate(&spec, &table()).unwrap();
        assert_eq!(chart.vega_lite["mark"], json!("bar"));
        assert_eq!(chart.vega_lite["encoding"]["x"]["field"], json!("REGION"));
        assert_eq!(chart.vega_lite["encoding"]["y"]["type"], json!("quantitative"));
        assert_eq!(chart.vega_lite["data"]["values"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn pie_uses_theta_encoding() {
        let spec = ChartSpec {
            kind: ChartKind::Pie,
            title: "share".into(),
            x: "REGION".into(),
            y: "AMOUNT".into(),
            color: None,
        };
        let chart = evaluate(&spec, &table()).unwrap();
        assert_eq!(chart.vega_lite["mark"], json!("arc"));
        assert_eq!(chart.vega_lite["encoding"]["theta"]["field"], json!("AMOUNT"));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let spec = ChartSpec {
            kind: ChartKind::Line,
            title: "t".into(),
            x: "NOPE".into(),
            y: "AMOUNT".into(),
            color: None,
        };
        let err = evaluate(&spec, &table()).unwrap_err();
        assert!(err.to_string().contains("unknown column 'NOPE'"));
    }
}
