mod common;

use analyst_core::engine::execute_with_retry;
use analyst_core::generate::ArtifactKind;
use analyst_core::pipeline::Analyst;
use analyst_core::warehouse::TableData;
use analyst_core::AnalystConfig;
use common::*;
use serde_json::json;
use std::sync::Arc;

fn sql_response(sql: &str) -> Script {
    Script::Ok(format!("```sql\n{sql}\n```"))
}

#[tokio::test]
async fn fenced_sql_executes_and_succeeds_on_first_attempt() {
    let gen = ScriptedGenerator::new();
    gen.script(ArtifactKind::Sql, vec![Script::Ok("```sql\nSELECT 1```".into())]);
    let wh = ScriptedWarehouse::with(vec![WarehouseScript::Ok(result_table())]);

    let outcome = execute_with_retry(&gen, &wh, "Business Question: q", 5).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.sql, "SELECT 1");
    assert_eq!(outcome.last_error, None);
    assert_eq!(wh.queries(), vec!["SELECT 1"]);
}

#[tokio::test]
async fn empty_results_retry_until_the_bound_inclusive() {
    let gen = ScriptedGenerator::new();
    gen.script(
        ArtifactKind::Sql,
        (0..5).map(|_| sql_response("SELECT region FROM sales")).collect(),
    );
    let wh = ScriptedWarehouse::with(vec![
        WarehouseScript::Ok(empty_table()),
        WarehouseScript::Ok(empty_table()),
        WarehouseScript::Ok(empty_table()),
        WarehouseScript::Ok(empty_table()),
        WarehouseScript::Ok(result_table()),
    ]);

    let outcome = execute_with_retry(&gen, &wh, "q", 5).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 5);

    // The fifth generation call must see the fourth failure in its trail.
    let prompts = gen.prompts_for(ArtifactKind::Sql);
    assert_eq!(prompts.len(), 5);
    assert!(prompts[4].contains("QUERY FAILED! Attempt 4"));
    assert!(prompts[4].contains("the query returned an empty result"));
    assert!(prompts[4].contains("SQL Code: SELECT region FROM sales"));
}

#[tokio::test]
async fn exhaustion_surfaces_the_last_error_without_raising() {
    let gen = ScriptedGenerator::new();
    gen.script(
        ArtifactKind::Sql,
        (0..5).map(|_| sql_response("SELECT nope FROM missing")).collect(),
    );
    let wh = ScriptedWarehouse::with(
        (0..5)
            .map(|_| WarehouseScript::Err("Catalog Error: table missing does not exist".into()))
            .collect(),
    );

    let outcome = execute_with_retry(&gen, &wh, "q", 5).await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts, 5);
    assert!(outcome.table.is_none());
    let err = outcome.last_error.expect("terminal error");
    assert!(err.contains("Catalog Error: table missing does not exist"));
}

#[tokio::test]
async fn missing_fence_fails_without_touching_the_warehouse() {
    let gen = ScriptedGenerator::new();
    gen.script(
        ArtifactKind::Sql,
        (0..5).map(|_| Script::Ok("I cannot produce a query for that.".into())).collect(),
    );
    let wh = ScriptedWarehouse::with(vec![]);

    let outcome = execute_with_retry(&gen, &wh, "q", 5).await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts, 5);
    assert!(wh.queries().is_empty(), "empty extraction must not execute");
    assert_eq!(
        outcome.last_error.as_deref(),
        Some("no fenced code block in generation response")
    );
}

#[tokio::test]
async fn generation_errors_feed_the_retry_trail() {
    let gen = ScriptedGenerator::new();
    gen.script(
        ArtifactKind::Sql,
        vec![
            Script::Err("502 Bad Gateway".into()),
            sql_response("SELECT 1"),
        ],
    );
    let wh = ScriptedWarehouse::with(vec![WarehouseScript::Ok(result_table())]);

    let outcome = execute_with_retry(&gen, &wh, "q", 5).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 2);
    let prompts = gen.prompts_for(ArtifactKind::Sql);
    assert!(prompts[1].contains("502 Bad Gateway"));
    assert!(prompts[1].contains("SQL Code: None"));
}

fn info_schema_rows() -> TableData {
    TableData::new(
        vec!["COLUMN_NAME".into(), "DATA_TYPE".into(), "IS_NULLABLE".into()],
        vec![
            vec![json!("REGION"), json!("VARCHAR"), json!("YES")],
            vec![json!("AMOUNT"), json!("BIGINT"), json!("YES")],
        ],
    )
}

#[tokio::test]
async fn full_pipeline_writes_a_report() {
    let gen = Arc::new(ScriptedGenerator::new());
    gen.script(
        ArtifactKind::Sql,
        vec![sql_response("SELECT region, SUM(amount) AS amount FROM sales GROUP BY region")],
    );
    gen.script(ArtifactKind::ChartSpec, vec![Script::Ok(chart_pair_response())]);
    gen.script(
        ArtifactKind::Analysis,
        vec![Script::Ok("**Revenue** concentrates in the east.".into())],
    );

    let wh = Arc::new(ScriptedWarehouse::with(vec![
        // context aggregation: information schema, row count, sample
        WarehouseScript::Ok(info_schema_rows()),
        WarehouseScript::Ok(TableData::new(vec!["COUNT(*)".into()], vec![vec![json!(2)]])),
        WarehouseScript::Ok(result_table()),
        // engine attempt
        WarehouseScript::Ok(result_table()),
    ]));

    let runs_dir = tempfile::tempdir().unwrap();
    let config = AnalystConfig {
        runs_root: Some(runs_dir.path().to_path_buf()),
        ..Default::default()
    };
    let analyst = Analyst::new(config, gen.clone(), wh);

    let run = analyst
        .run_question("Where is revenue concentrated?", &["sales".into()])
        .await
        .unwrap();

    assert!(run.is_success());
    assert_eq!(run.attempts, 1);
    assert!(run.charts.is_some());
    assert_eq!(run.analysis.as_deref(), Some("**Revenue** concentrates in the east."));

    let html = run.report_html.as_deref().unwrap();
    assert!(html.contains("Where is revenue concentrated?"));
    assert!(html.contains("SELECT region, SUM(amount)"));
    assert!(html.contains("vega-lite"));
    assert!(html.contains("<strong>Revenue</strong>"));

    let link = run.download_link.as_deref().unwrap();
    assert!(link.starts_with("<a href=\"data:text/html;base64,"));
    assert!(link.contains("download=\"report.html\""));

    let dir = run.run_dir.as_ref().unwrap();
    assert!(dir.join("report.html").exists());
    assert!(dir.join("manifest.json").exists());

    // The SQL prompt carries the aggregated context.
    let sql_prompt = &gen.prompts_for(ArtifactKind::Sql)[0];
    assert!(sql_prompt.contains("Business Question: Where is revenue concentrated?"));
    assert!(sql_prompt.contains("Table: sales"));
    assert!(sql_prompt.contains("Frequent Values"));
}

#[tokio::test]
async fn exhausted_pipeline_returns_without_artifacts() {
    let gen = Arc::new(ScriptedGenerator::new());
    gen.script(
        ArtifactKind::Sql,
        (0..5).map(|_| Script::Ok("no fence".into())).collect(),
    );
    let wh = Arc::new(ScriptedWarehouse::with(vec![
        WarehouseScript::Ok(info_schema_rows()),
        WarehouseScript::Ok(TableData::new(vec!["COUNT(*)".into()], vec![vec![json!(2)]])),
        WarehouseScript::Ok(result_table()),
    ]));
    let runs_dir = tempfile::tempdir().unwrap();
    let config = AnalystConfig {
        runs_root: Some(runs_dir.path().to_path_buf()),
        ..Default::default()
    };
    let analyst = Analyst::new(config, gen, wh);

    let run = analyst.run_question("q", &["sales".into()]).await.unwrap();

    assert!(!run.is_success());
    assert_eq!(run.attempts, 5);
    assert!(run.charts.is_none());
    assert!(run.report_html.is_none());
    assert!(run.run_dir.is_none());
}
