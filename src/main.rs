use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use fs_salebot::clock::SystemClock;
use fs_salebot::config::{self, Config};
use fs_salebot::discord::DiscordWebhook;
use fs_salebot::history::NotificationHistory;
use fs_salebot::notifier::Notifier;
use fs_salebot::pipeline;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Watch the savegame's vehicle sales, render the listing page and announce changes to Discord"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Do not re-render; announce from the existing snapshot
    #[arg(long)]
    skip_render: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = Arc::new(config::load(Some(&args.config))?);
    cfg.ensure_dirs()?;

    let chat = Arc::new(DiscordWebhook::new(&cfg.chat.endpoint)?);
    let notifier = Notifier::from_config(&cfg, chat, Arc::new(SystemClock));

    if args.once {
        return run_cycle(&cfg, &notifier, args.skip_render).await;
    }

    let mut ticker = tokio::time::interval(cfg.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = cfg.schedule.poll_interval_secs, "starting sale watcher");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = run_cycle(&cfg, &notifier, args.skip_render).await {
                    error!(?err, "cycle failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One full cycle: render (unless skipped), reload the snapshot, announce.
#[instrument(skip_all)]
async fn run_cycle(cfg: &Arc<Config>, notifier: &Notifier, skip_render: bool) -> Result<()> {
    if !skip_render {
        let render_cfg = Arc::clone(cfg);
        tokio::task::spawn_blocking(move || pipeline::render_from_config(&render_cfg))
            .await
            .context("render task panicked")??;
    }

    let listings = pipeline::load_snapshot(&cfg.paths.snapshot_output)?;
    let mut history = NotificationHistory::load(&cfg.paths.history_file);
    let report = notifier.run_cycle(&listings, &mut history).await?;
    info!(
        posted = report.posted,
        suppressed = report.suppressed,
        failed = report.failed,
        banners = report.banners.len(),
        "cycle complete"
    );
    Ok(())
}
