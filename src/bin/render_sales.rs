use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use fs_salebot::config;
use fs_salebot::pipeline;

#[derive(Debug, Parser)]
#[command(
    about = "Resolve the current vehicle sales once and write the listing page and snapshot. Nothing is posted."
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let listings = pipeline::render_from_config(&cfg)?;
    info!(count = listings.len(), "rendered listings");
    println!("Page full path: {}", cfg.paths.page_output.display());
    println!("Snapshot full path: {}", cfg.paths.snapshot_output.display());
    Ok(())
}
