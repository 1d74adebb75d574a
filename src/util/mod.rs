//! Utility functions shared by the config loader and the feed renderer.
//!
//! - **URL validation**: feed URLs must be absolute http(s) URLs with a host
//! - **Text processing**: UTF-8 safe truncation of item titles
//!
//! # Examples
//!
//! ```
//! use rss_to_hass::util::{truncate_chars, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(truncate_chars("Hyvää päivää", 5), "Hyvää");
//! ```

mod text;
mod url_validator;

pub use text::truncate_chars;
pub use url_validator::{validate_feed_url, UrlValidationError};
