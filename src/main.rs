use anyhow::{Context, Result};
use clap::Parser;
use rss_to_hass::config::Config;
use rss_to_hass::signals::cancel_on_shutdown_signal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rss-to-hass",
    version,
    about = "Pushes RSS feeds into Home Assistant as markdown"
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Validate the configuration, print a summary and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.check_config {
        let prefix = config.topic_prefix();
        println!("Broker: {} (client id {})", config.mqtt.address, config.mqtt.client_id());
        println!("Poll interval: {}s", config.poll_interval_secs);
        for feed in &config.feeds {
            println!(
                "  {} -> {} ({})",
                feed.id,
                prefix.attributes_topic(&feed.id),
                feed.url
            );
        }
        println!("Configuration OK: {} feeds", config.feeds.len());
        return Ok(());
    }

    let cancel = cancel_on_shutdown_signal();

    rss_to_hass::run(config, cancel).await
}
