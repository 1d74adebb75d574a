//! Feed retrieval and rendering.
//!
//! - [`fetcher`] - HTTP retrieval bound to a cancellation token
//! - [`parser`] - RSS/Atom parsing using the `feed-rs` crate
//! - [`render`] - bounded Markdown rendering of the item list
//!
//! # Example
//!
//! ```ignore
//! use rss_to_hass::feed::{fetch, render, DEFAULT_MAX_ITEMS, DEFAULT_MAX_LINE_LENGTH};
//!
//! let feed = fetch(&client, "https://example.com/rss", &cancel).await?;
//! let md = render(&feed.items, DEFAULT_MAX_ITEMS, DEFAULT_MAX_LINE_LENGTH);
//! ```

mod fetcher;
mod parser;
mod render;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use fetcher::{fetch_bytes, FetchError};
pub use parser::{parse_feed, FeedItem, ParseError, ParsedFeed};
pub use render::{render, DEFAULT_MAX_ITEMS, DEFAULT_MAX_LINE_LENGTH};

/// Failure to turn a feed URL into a [`ParsedFeed`].
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Fetches `url` and parses the body as an RSS or Atom feed.
///
/// # Errors
///
/// - [`FeedError::Fetch`] on transport failures, non-2xx status, timeout or
///   cancellation
/// - [`FeedError::Parse`] when the body is not a recognizable feed
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<ParsedFeed, FeedError> {
    let bytes = fetch_bytes(client, url, cancel).await?;
    Ok(parse_feed(&bytes)?)
}
