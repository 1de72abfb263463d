//! Stormwatch Ingestion
//!
//! Offline build of the alert vector index:
//! 1. Loads the alert table
//! 2. Builds one document per alert
//! 3. Chunks and embeds the documents
//! 4. Persists the vector index

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stormwatch_common::{config::AppConfig, index::BuildMode, telemetry, VERSION};
use stormwatch_ingestion::IndexBuilder;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ingestion", version, about = "Build the Stormwatch alert vector index")]
struct Args {
    /// Alert CSV to index (defaults to ingestion.csv_path)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Index directory (defaults to index.path)
    #[arg(long)]
    index: Option<PathBuf>,

    /// Keep existing entries and append the new ones
    #[arg(long)]
    append: bool,

    /// Configuration file to load instead of the config/ directory
    #[arg(long, env = "STORMWATCH_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    info!("Starting Stormwatch Ingestion v{}", VERSION);

    if args.append {
        config.ingestion.build_mode = BuildMode::Append;
    }
    let csv_path = args.csv.unwrap_or_else(|| config.ingestion.csv_path.clone());
    let index_path = args.index.unwrap_or_else(|| config.index.path.clone());

    let builder = IndexBuilder::from_config(&config)?;
    let report = builder
        .run(&csv_path, &index_path)
        .await
        .with_context(|| format!("index build from {} failed", csv_path.display()))?;

    println!("Loaded {} documents", report.documents);
    println!("Created {} chunks", report.chunks);
    println!(
        "Vector index ({}) saved to {}",
        report.model,
        report.index_path.display()
    );

    Ok(())
}
