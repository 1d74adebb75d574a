//! Per-feed polling: fetch, render, detect change, publish.

use crate::config::FeedConfig;
use crate::detector::ChangeDetector;
use crate::feed::{self, FeedError, FetchError, DEFAULT_MAX_ITEMS, DEFAULT_MAX_LINE_LENGTH};
use crate::homeassistant::{Attributes, PublishError, Publisher, SensorEntity, TopicPrefix};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A poll of one feed failed. Carries the feed id so the failure can be
/// reported without further context.
#[derive(Debug, Error)]
#[error("{feed_id}: {kind}")]
pub struct PollError {
    pub feed_id: String,
    #[source]
    pub kind: PollErrorKind,
}

impl PollError {
    /// The poll was cut short by the shared cancellation token rather than
    /// failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.kind,
            PollErrorKind::Feed(FeedError::Fetch(FetchError::Cancelled))
                | PollErrorKind::Publish(PublishError::Cancelled)
        )
    }
}

#[derive(Debug, Error)]
pub enum PollErrorKind {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Outcome of a successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged,
    Published,
}

/// Re-runnable unit of work for one feed.
///
/// Owns the feed's [`ChangeDetector`]; nothing else carries state between
/// runs.
#[derive(Debug)]
pub struct PollTask<P> {
    feed: FeedConfig,
    sensor: SensorEntity,
    detector: ChangeDetector,
    max_line_length: usize,
    http: reqwest::Client,
    publisher: P,
}

impl<P: Publisher> PollTask<P> {
    pub fn new(
        feed: FeedConfig,
        prefix: &TopicPrefix,
        http: reqwest::Client,
        publisher: P,
    ) -> Self {
        let sensor = SensorEntity::for_feed(prefix, &feed.id);
        Self {
            feed,
            sensor,
            detector: ChangeDetector::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            http,
            publisher,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn feed_id(&self) -> &str {
        &self.feed.id
    }

    /// The entity this task publishes to; announce it before the first poll.
    pub fn sensor(&self) -> &SensorEntity {
        &self.sensor
    }

    /// Fetches the feed and publishes its rendering if it changed since the
    /// previous call.
    pub async fn poll(&mut self, cancel: CancellationToken) -> Result<PollOutcome, PollError> {
        let parsed = feed::fetch(&self.http, &self.feed.url, &cancel)
            .await
            .map_err(|e| self.wrap(e))?;

        let max_items = self.feed.item_display_limit.unwrap_or(DEFAULT_MAX_ITEMS);
        let markdown = feed::render(&parsed.items, max_items, self.max_line_length);

        if !self.detector.changed(&markdown) {
            tracing::debug!(feed = %self.feed.id, "unchanged");
            return Ok(PollOutcome::Unchanged);
        }

        tracing::info!(feed = %self.feed.id, "Feed changed");

        // Content goes in attributes; entity state is capped at 255 chars
        let attributes = Attributes::from([
            ("title".to_string(), parsed.title),
            ("md".to_string(), markdown),
            ("url".to_string(), self.feed.url.clone()),
        ]);

        tokio::select! {
            _ = cancel.cancelled() => Err(self.wrap(PublishError::Cancelled)),
            result = self.publisher.publish_attributes(&self.sensor, &attributes) => {
                result.map_err(|e| self.wrap(e))?;
                Ok(PollOutcome::Published)
            }
        }
    }

    fn wrap(&self, kind: impl Into<PollErrorKind>) -> PollError {
        PollError {
            feed_id: self.feed.id.clone(),
            kind: kind.into(),
        }
    }
}
