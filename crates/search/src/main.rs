//! Stormwatch Search
//!
//! Retrieval smoke test: opens the persisted index with the configured
//! embedding provider and prints the top-k alerts for a question.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stormwatch_common::{config::AppConfig, telemetry, VERSION};
use stormwatch_search::{open_retriever, Retriever};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "search", version, about = "Query the Stormwatch alert index")]
struct Args {
    /// Question to retrieve alerts for
    query: String,

    /// Index directory (defaults to index.path)
    #[arg(long)]
    index: Option<PathBuf>,

    /// Number of chunks to retrieve (defaults to retrieval.top_k)
    #[arg(short, long)]
    k: Option<usize>,

    /// Configuration file to load instead of the config/ directory
    #[arg(long, env = "STORMWATCH_CONFIG")]
    config: Option<String>,
}

const PREVIEW_CHARS: usize = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    info!("Starting Stormwatch Search v{}", VERSION);

    if let Some(index) = args.index {
        config.index.path = index;
    }
    if let Some(k) = args.k {
        config.retrieval.top_k = k;
    }

    let retriever = open_retriever(&config)
        .await
        .with_context(|| format!("failed to open index at {}", config.index.path.display()))?;
    let result = retriever.retrieve(&args.query).await?;

    println!("Top {} results for: {}", result.len(), result.query);
    for (rank, hit) in result.hits.iter().enumerate() {
        let metadata = &hit.chunk.metadata;

        println!("\n[{}] score {:.4}", rank + 1, hit.score);
        println!("Event:    {}", metadata.event);
        println!("Severity: {}", metadata.severity);
        println!("Area:     {}", preview(&metadata.area_desc));
        println!("Headline: {}", preview(&metadata.headline));
    }

    Ok(())
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(PREVIEW_CHARS + 20);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview("Heat Alert"), "Heat Alert");
    }
}
