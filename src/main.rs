mod catalog;
mod client;
mod config;
mod error;
mod extractors;
mod harvest;
mod pipeline;
mod probe;
mod speed;
#[cfg(test)]
mod test_support;
mod traits;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Settings;
use pipeline::PipelineContext;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use types::RunSummary;

#[derive(Parser)]
#[command(name = "iptv-updater")]
#[command(about = "Discover IPTV endpoints, speed-test their channels and write a playlist", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest, probe, speed-test and write the playlist (default)
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => handle_run().await?,
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

// --- Handlers ---

async fn handle_run() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    let ctx = PipelineContext::new(settings).context("Failed to build HTTP client")?;

    let summary = pipeline::run(&ctx).await.context("Run aborted")?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "-".repeat(50));
    println!("{:<28} {}", "Endpoints discovered", summary.endpoints);
    println!("{:<28} {}", "Seed sources failed", summary.failed_sources.len());
    println!("{:<28} {}", "Endpoints with channels", summary.live_endpoints);
    println!("{:<28} {}", "Channels tested", summary.channels_tested);
    println!("{:<28} {}", "Channels accepted", summary.channels_accepted);
    println!("{:<28} {}", "CCTV lines", summary.cctv_lines);
    println!("{:<28} {}", "Satellite lines", summary.satellite_lines);
    println!("{:<28} {}", "Other lines", summary.other_lines);
    println!("{}", "-".repeat(50));

    for source in &summary.failed_sources {
        println!("Failed source: {}", source);
    }
    println!("Playlist written to {}", summary.output_path);
}
