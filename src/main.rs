use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use metwarn::config::Config;
use metwarn::controller::{FeedSnapshot, FeedState, RefreshController, RefreshEvent};

/// Get the config file path (~/.config/metwarn/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("metwarn")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "metwarn",
    about = "Watches the UK Met Office regional weather-warning feed"
)]
struct Args {
    /// Path to config file (default: ~/.config/metwarn/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Region code appended to the feed base URL
    #[arg(long)]
    region: Option<String>,

    /// Override the feed base URL
    #[arg(long)]
    feed_url: Option<String>,

    /// Milliseconds between refresh cycles
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Run a single refresh cycle, print the result, and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path).context("Failed to load configuration")?;

    // CLI flags override the config file
    if let Some(region) = args.region {
        config.region = region;
    }
    if let Some(feed_url) = args.feed_url {
        config.feed_url = feed_url;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.update_interval_ms = interval_ms;
    }

    let feed_url = config.full_feed_url().context("Invalid feed URL")?;
    tracing::info!(url = %feed_url, "Watching warnings feed");

    let client = reqwest::Client::new();
    let (event_tx, mut event_rx) = mpsc::channel::<RefreshEvent>(16);
    let controller = Arc::new(
        RefreshController::new(client, feed_url.to_string(), config.header.clone())
            .with_events(event_tx),
    );

    if args.once {
        controller
            .trigger_cycle()
            .await
            .context("Refresh cycle failed")?;
        print_state(&controller.snapshot());
        return Ok(());
    }

    let interval = Duration::from_millis(config.update_interval_ms.max(1));
    tokio::spawn(Arc::clone(&controller).run(interval));

    // Shows "Loading..." until the first cycle lands
    print_state(&controller.snapshot());

    while let Some(event) = event_rx.recv().await {
        match event {
            RefreshEvent::Updated { skipped, .. } => {
                if skipped > 0 {
                    tracing::warn!(skipped, "Dropped feed items without a title");
                }
                print_state(&controller.snapshot());
            }
            RefreshEvent::Failed { error } => {
                eprintln!("Refresh failed: {} (keeping last known warnings)", error);
            }
        }
    }

    Ok(())
}

fn print_state(state: &FeedState) {
    println!("== {} ==", state.header);
    match &state.snapshot {
        FeedSnapshot::Loading => println!("Loading..."),
        FeedSnapshot::Empty => println!("No Current Warnings"),
        FeedSnapshot::Ready(warnings) => {
            for warning in warnings.iter() {
                println!("[{}] {}", warning.level, warning);
            }
        }
    }
}
