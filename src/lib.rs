//! Mirrors RSS/Atom feeds into Home Assistant as Markdown sensors over MQTT.
//!
//! Each configured feed becomes one sensor entity. Entities are announced via
//! MQTT discovery at startup; afterwards every feed is polled on a fixed
//! interval and its rendered item list is published as entity attributes
//! whenever it changes.
//!
//! - [`config`] - TOML configuration and validation
//! - [`feed`] - fetching, parsing and rendering feeds
//! - [`detector`] - per-feed change detection
//! - [`homeassistant`] - entity model and the MQTT client
//! - [`poll`] - the per-feed poll task
//! - [`orchestrator`] - concurrent fan-out with error aggregation
//! - [`scheduler`] - fixed-interval driver

pub mod config;
pub mod detector;
pub mod feed;
pub mod homeassistant;
pub mod orchestrator;
pub mod poll;
pub mod scheduler;
pub mod signals;
pub mod util;

use anyhow::{Context, Result};
use config::Config;
use homeassistant::{BrokerError, MqttClient, Publisher, SensorEntity};
use orchestrator::launch_and_wait_many;
use poll::{PollError, PollTask};
use scheduler::{Pass, Scheduler};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// All poll tasks of the process, run as one pass per tick.
#[derive(Debug)]
pub struct FeedPoller<P> {
    tasks: Vec<PollTask<P>>,
}

impl<P: Publisher> FeedPoller<P> {
    pub fn new(tasks: Vec<PollTask<P>>) -> Self {
        Self { tasks }
    }

    /// Entities to announce before the first pass.
    pub fn sensors(&self) -> Vec<SensorEntity> {
        self.tasks.iter().map(|t| t.sensor().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<P: Publisher> Pass for FeedPoller<P> {
    async fn run_pass(&mut self, cancel: &CancellationToken) {
        let tasks = self.tasks.iter_mut().map(|task| {
            move |token: CancellationToken| async move { task.poll(token).await }
        });

        // Failures are logged per feed and retried on the next tick
        let result = launch_and_wait_many(cancel, tasks, |err: &PollError| {
            if err.is_cancelled() && cancel.is_cancelled() {
                tracing::debug!(feed = %err.feed_id, "Feed poll interrupted by shutdown");
            } else {
                tracing::error!(feed = %err.feed_id, error = %err.kind, "Feed poll failed");
            }
        })
        .await;

        if result.is_err() {
            tracing::debug!("Pass finished with failures");
        }
    }
}

/// Builds the shared HTTP client for feed fetches.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

/// Connects to the broker, announces every feed's entity and polls until
/// `cancel` fires.
///
/// Returns `Ok(())` on cancellation. Failing to connect or to announce the
/// entities is fatal; per-feed poll failures are only logged.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<()> {
    let (mqtt, driver) = match MqttClient::connect(&config.mqtt, &cancel).await {
        Ok(connection) => connection,
        Err(BrokerError::Cancelled) => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to connect to {}", config.mqtt.address))
        }
    };

    let http = http_client().context("Failed to build HTTP client")?;
    let prefix = config.topic_prefix();

    let tasks = config
        .feeds
        .iter()
        .cloned()
        .map(|feed| {
            PollTask::new(feed, &prefix, http.clone(), mqtt.clone())
                .with_max_line_length(config.max_line_length)
        })
        .collect();
    let mut poller = FeedPoller::new(tasks);

    let result: Result<()> = async {
        mqtt.announce_discovery(&poller.sensors())
            .await
            .context("Failed to announce entities")?;

        tracing::info!(
            feeds = poller.len(),
            interval_secs = config.poll_interval_secs,
            "Polling feeds"
        );

        Scheduler::new(config.poll_interval())
            .run(&mut poller, &cancel)
            .await;

        Ok(())
    }
    .await;

    mqtt.disconnect(driver).await;
    result
}
