use analyst_core::catalog::{render_dictionary, CatalogClient};
use analyst_core::{AnalysisRun, Analyst, AnalystConfig, DuckDbWarehouse, HttpGenerator, Warehouse};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about = "Quarry — ask business questions of your warehouse")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a business question over one or more tables
    Ask {
        #[arg(long)]
        question: String,
        /// Table to include; repeat for several
        #[arg(long = "table", required = true)]
        tables: Vec<String>,
    },
    /// Suggest a question to ask of the given tables
    Suggest {
        #[arg(long = "table", required = true)]
        tables: Vec<String>,
    },
    /// Natural-language summary of one table
    Describe {
        #[arg(long)]
        table: String,
    },
    /// Fetch column definitions from the configured catalog
    Dictionary {
        #[arg(long)]
        table_id: String,
    },
    /// List recent runs
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Environment and configuration checks
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_tracing();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { question, tables } => cmd_ask(&question, &tables).await,
        Commands::Suggest { tables } => cmd_suggest(&tables).await,
        Commands::Describe { table } => cmd_describe(&table).await,
        Commands::Dictionary { table_id } => cmd_dictionary(&table_id).await,
        Commands::Runs { limit } => cmd_runs(limit),
        Commands::Doctor => cmd_doctor(),
    }
}

fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

fn build_analyst() -> Result<Analyst> {
    let config = AnalystConfig::from_env().context("configuration incomplete")?;
    let generator = Arc::new(HttpGenerator::new(&config));
    let warehouse = Arc::new(DuckDbWarehouse::new(&config.warehouse_path)?);
    Ok(Analyst::new(config, generator, warehouse))
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

async fn cmd_ask(question: &str, tables: &[String]) -> Result<()> {
    let analyst = build_analyst()?;
    let pb = spinner("Analyzing...");
    let run = analyst.run_question(question, tables).await?;
    pb.finish_and_clear();
    print_run(&run);
    Ok(())
}

fn print_run(run: &AnalysisRun) {
    if !run.is_success() {
        if run.table.is_some() {
            println!("The query returns an empty result. Try rephrasing the question.");
        } else {
            println!(
                "I tried a few different ways, but couldn't get a working solution. \
                 Rephrase the question and try again."
            );
        }
        if let Some(err) = &run.last_error {
            println!("Last error after {} attempts: {err}", run.attempts);
        }
        return;
    }

    println!("SQL ({} attempt(s)):\n{}\n", run.attempts, run.sql);
    if let Some(table) = &run.table {
        println!("Result:\n{}", table.to_text());
    }
    if run.charts.is_none() {
        println!("{}", analyst_core::artifacts::CHARTS_UNAVAILABLE);
    }
    if let Some(analysis) = &run.analysis {
        println!("Analysis:\n{analysis}\n");
    }
    if let Some(dir) = &run.run_dir {
        println!(
            "Report written to {}",
            dir.join(analyst_core::report::REPORT_FILENAME).display()
        );
    }
}

async fn cmd_suggest(tables: &[String]) -> Result<()> {
    let analyst = build_analyst()?;
    let suggestion = analyst.suggest_question(tables).await?;
    println!("{suggestion}");
    Ok(())
}

async fn cmd_describe(table: &str) -> Result<()> {
    let analyst = build_analyst()?;
    let summary = analyst.summarize_table(table).await?;
    println!("{summary}");
    Ok(())
}

async fn cmd_dictionary(table_id: &str) -> Result<()> {
    let config = AnalystConfig::from_env().context("configuration incomplete")?;
    let endpoint = config
        .catalog_endpoint
        .context("QUARRY_CATALOG_ENDPOINT is not set")?;
    let api_key = config
        .catalog_api_key
        .context("QUARRY_CATALOG_API_KEY is not set")?;
    let client = CatalogClient::new(endpoint, api_key);
    let defs = client.column_definitions(table_id).await?;
    print!("{}", render_dictionary(&defs));
    Ok(())
}

fn cmd_runs(limit: usize) -> Result<()> {
    let analyst = build_analyst()?;
    for dir in analyst.list_runs(limit)? {
        let manifest = dir.join("manifest.json");
        if let Ok(bytes) = fs_err::read(&manifest) {
            if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                println!(
                    "{}  {}",
                    v.get("id").and_then(|x| x.as_str()).unwrap_or("?"),
                    v.get("question").and_then(|x| x.as_str()).unwrap_or("?"),
                );
                continue;
            }
        }
        println!("{}", dir.display());
    }
    Ok(())
}

fn cmd_doctor() -> Result<()> {
    println!("Quarry doctor:");
    match AnalystConfig::from_env() {
        Ok(config) => {
            println!(" - config: ok (prediction server {})", config.prediction_server);
            match DuckDbWarehouse::new(&config.warehouse_path) {
                Ok(wh) => match wh.table_names() {
                    Ok(tables) => println!(
                        " - warehouse: ok ({} tables: {})",
                        tables.len(),
                        tables.join(", ")
                    ),
                    Err(e) => println!(" - warehouse: error: {e}"),
                },
                Err(e) => println!(" - warehouse: error: {e}"),
            }
            println!(
                " - catalog: {}",
                if config.catalog_endpoint.is_some() { "configured" } else { "not configured" }
            );
        }
        Err(e) => println!(" - config: error: {e}"),
    }
    Ok(())
}
