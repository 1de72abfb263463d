//! Stormwatch Ask
//!
//! Answers one question about the indexed weather alerts from the command
//! line, using the same orchestrator the gateway serves.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use stormwatch_common::{config::AppConfig, telemetry, VERSION};
use stormwatch_context::Orchestrator;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ask", version, about = "Ask a question about current weather alerts")]
struct Args {
    /// Question to answer
    question: String,

    /// Configuration file to load instead of the config/ directory
    #[arg(long, env = "STORMWATCH_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    info!("Starting Stormwatch Ask v{}", VERSION);

    let orchestrator = Orchestrator::from_config(Arc::new(config));
    let answer = orchestrator.respond(&args.question).await;

    println!("{}", answer);
    Ok(())
}
