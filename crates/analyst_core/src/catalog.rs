//! Data-dictionary lookup against the catalog service. The listing endpoint
//! is paginated: keep following `links.next` until it is null, keep only the
//! allow-listed fields of each item, and flatten the nested AI-hint custom
//! property to a top-level field.

use crate::error::{AnalystError, Result};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub column_name: String,
    pub ai_hint: Option<String>,
    pub description: Option<String>,
}

pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Retrieve the column definitions associated with a table id.
    pub async fn column_definitions(&self, table_id: &str) -> Result<Vec<ColumnDefinition>> {
        let filter = json!({
            "operator": "and",
            "operands": [
                {
                    "operator": "or",
                    "operands": [
                        {"operands": [], "field": "native_type", "operator": "exact", "value": "column"}
                    ]
                },
                {
                    "operator": "or",
                    "operands": [
                        {"operands": [], "field": "parent_id", "operator": "exact", "value": table_id}
                    ]
                }
            ]
        });

        let url = format!("{}/resource/catalog", self.base_url.trim_end_matches('/'));
        let mut page: serde_json::Value = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .query(&[("filter", filter.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut items: Vec<serde_json::Value> = take_results(&mut page)?;
        while let Some(next) = page.pointer("/links/next").and_then(|v| v.as_str()) {
            let next = next.to_string();
            page = self
                .client
                .get(&next)
                .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            items.extend(take_results(&mut page)?);
        }

        Ok(items.iter().map(clean_item).collect())
    }
}

fn take_results(page: &mut serde_json::Value) -> Result<Vec<serde_json::Value>> {
    match page.get_mut("results").map(serde_json::Value::take) {
        Some(serde_json::Value::Array(items)) => Ok(items),
        _ => Err(AnalystError::Catalog("listing response missing results".into())),
    }
}

// Allowlist {title_cased, description, properties, type}; everything else on
// the item is dropped, and properties.custom.AI_Hints surfaces as ai_hint.
fn clean_item(item: &serde_json::Value) -> ColumnDefinition {
    ColumnDefinition {
        column_name: item
            .get("title_cased")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        ai_hint: item
            .pointer("/properties/custom/AI_Hints")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        description: item
            .get("description")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    }
}

/// Render definitions as the dictionary text used in prompts.
pub fn render_dictionary(defs: &[ColumnDefinition]) -> String {
    let mut out = String::new();
    for d in defs {
        out.push_str(&format!(
            "{}: {}",
            d.column_name,
            d.description.as_deref().unwrap_or("(no description)")
        ));
        if let Some(hint) = &d.ai_hint {
            out.push_str(&format!(" [hint: {hint}]"));
        }
        out.push('\n');
    }
    out
}
