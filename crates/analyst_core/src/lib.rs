//! Core pipeline for the Quarry AI data analyst.
//!
//! A question travels through four stages: the context aggregator collects
//! schema text and row samples for the selected tables, the synthesizer asks
//! the generation service for SQL, the execution engine runs that SQL against
//! the warehouse inside a bounded retry loop that feeds failures back into the
//! prompt, and the artifact stage produces two charts plus an analysis text
//! concurrently before everything is assembled into an HTML report.

pub mod artifacts;
pub mod catalog;
pub mod charts;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod util;
pub mod warehouse;

pub use config::AnalystConfig;
pub use error::{AnalystError, Result};
pub use generate::{ArtifactKind, GenerationService, HttpGenerator};
pub use pipeline::{AnalysisRun, Analyst};
pub use warehouse::{DuckDbWarehouse, TableData, Warehouse};
