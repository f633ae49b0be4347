#![allow(dead_code)]

use analyst_core::error::{AnalystError, Result};
use analyst_core::generate::{ArtifactKind, GenerationService};
use analyst_core::warehouse::{TableData, Warehouse};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted generation response.
pub enum Script {
    Ok(String),
    Err(String),
    /// Block long past any test timeout.
    Hang,
}

#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<HashMap<ArtifactKind, VecDeque<Script>>>,
    prompts: Mutex<Vec<(ArtifactKind, String)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, kind: ArtifactKind, steps: Vec<Script>) {
        self.responses.lock().unwrap().entry(kind).or_default().extend(steps);
    }

    pub fn prompts_for(&self, kind: ArtifactKind) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, kind: ArtifactKind, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push((kind, prompt.to_string()));
        let step = self.responses.lock().unwrap().get_mut(&kind).and_then(|q| q.pop_front());
        match step {
            Some(Script::Ok(s)) => Ok(s),
            Some(Script::Err(e)) => Err(AnalystError::Generation(e)),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AnalystError::Generation("woke from hang".into()))
            }
            None => Err(AnalystError::Generation("script exhausted".into())),
        }
    }
}

pub enum WarehouseScript {
    Ok(TableData),
    Err(String),
}

#[derive(Default)]
pub struct ScriptedWarehouse {
    results: Mutex<VecDeque<WarehouseScript>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedWarehouse {
    pub fn with(results: Vec<WarehouseScript>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            queries: Mutex::new(vec![]),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl Warehouse for ScriptedWarehouse {
    fn query(&self, sql: &str) -> Result<TableData> {
        self.queries.lock().unwrap().push(sql.to_string());
        match self.results.lock().unwrap().pop_front() {
            Some(WarehouseScript::Ok(t)) => Ok(t),
            Some(WarehouseScript::Err(e)) => Err(AnalystError::Warehouse(e)),
            None => Err(AnalystError::Warehouse("script exhausted".into())),
        }
    }
}

pub fn result_table() -> TableData {
    TableData::new(
        vec!["REGION".into(), "AMOUNT".into()],
        vec![
            vec![json!("east"), json!(15)],
            vec![json!("west"), json!(20)],
        ],
    )
}

pub fn empty_table() -> TableData {
    TableData::new(vec!["REGION".into(), "AMOUNT".into()], vec![])
}

pub fn chart_pair_response() -> String {
    concat!(
        "```json\n",
        r#"[{"kind":"bar","title":"Revenue by region","x":"REGION","y":"AMOUNT"},"#,
        r#"{"kind":"pie","title":"Revenue share","x":"REGION","y":"AMOUNT"}]"#,
        "\n```"
    )
    .to_string()
}
