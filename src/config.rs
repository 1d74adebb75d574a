//! Configuration file parser (TOML).
//!
//! The file lists the feeds to mirror and how to reach the MQTT broker.
//! `[mqtt] address` is required; everything else has a default. Validation happens once at
//! load time; the polling core assumes a validated config.
use crate::feed::DEFAULT_MAX_LINE_LENGTH;
use crate::homeassistant::TopicPrefix;
use crate::util::{validate_feed_url, UrlValidationError};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Characters a feed id may not contain. `-` is silently rewritten to `_`
/// by Home Assistant, the rest are MQTT topic separators and wildcards.
const RESERVED_ID_CHARS: [char; 4] = ['-', '/', '+', '#'];

const DEFAULT_BROKER_PORT: u16 = 1883;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("RSS feed ID cannot contain '{reserved}': {id:?}")]
    ReservedCharInFeedId { id: String, reserved: char },

    #[error("RSS feed ID cannot be empty")]
    EmptyFeedId,

    #[error("Duplicate RSS feed ID: {0}")]
    DuplicateFeedId(String),

    #[error("Invalid URL for feed {id}: {source}")]
    InvalidFeedUrl {
        id: String,
        #[source]
        source: UrlValidationError,
    },

    #[error("Invalid MQTT broker address {0:?}: expected host:port")]
    InvalidBrokerAddress(String),

    #[error("poll_interval_secs must be greater than zero")]
    ZeroPollInterval,

    #[error("Invalid topic_prefix {0:?}: must be non-empty, without '+' or '#', and not start or end with '/'")]
    InvalidTopicPrefix(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Only `[mqtt]` is mandatory. A file without feeds is valid but polls
/// nothing.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Seconds between polling passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Longest item title (in characters) rendered per line.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Namespace for all published topics.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    pub mqtt: MqttConfig,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

/// Broker connection settings.
///
/// `password` is a [`SecretString`], so `Debug` output never shows it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttConfig {
    /// `host:port` of the broker.
    pub address: String,

    /// Defaults to `rss-to-homeassistant-<hostname>`.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl MqttConfig {
    pub fn client_id(&self) -> String {
        match &self.client_id {
            Some(id) => id.clone(),
            None => format!("rss-to-homeassistant-{}", hostname()),
        }
    }

    /// Broker host. Only meaningful after [`Config::validate`].
    pub fn host(&self) -> &str {
        split_address(&self.address)
            .map(|(host, _)| host)
            .unwrap_or(&self.address)
    }

    /// Broker port. Only meaningful after [`Config::validate`].
    pub fn port(&self) -> u16 {
        split_address(&self.address)
            .map(|(_, port)| port)
            .unwrap_or(DEFAULT_BROKER_PORT)
    }
}

/// One feed to mirror into Home Assistant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    /// Entity id; also the last topic segment.
    pub id: String,

    pub url: String,

    /// Lines rendered for this feed. Defaults to 8.
    #[serde(default)]
    pub item_display_limit: Option<usize>,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "poll_interval_secs",
        "max_line_length",
        "topic_prefix",
        "mqtt",
        "feeds",
    ];

    /// Load and validate configuration from a TOML file.
    ///
    /// - Missing file → `Err(ConfigError::Io)`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    /// - Unknown keys in `[mqtt]` or `[[feeds]]` → `Err(ConfigError::Parse)`
    /// - Invalid feed ids, URLs, topic prefix or broker address → the
    ///   matching variant
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file is {} bytes (max {} bytes)",
                meta.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;

        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            broker = %config.mqtt.address,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants the polling core relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        validate_topic_prefix(&self.topic_prefix)?;

        if split_address(&self.mqtt.address).is_none() {
            return Err(ConfigError::InvalidBrokerAddress(self.mqtt.address.clone()));
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            validate_feed_id(&feed.id)?;

            if !seen.insert(feed.id.as_str()) {
                return Err(ConfigError::DuplicateFeedId(feed.id.clone()));
            }

            validate_feed_url(&feed.url).map_err(|source| ConfigError::InvalidFeedUrl {
                id: feed.id.clone(),
                source,
            })?;
        }

        if self.feeds.is_empty() {
            tracing::warn!("No feeds configured, nothing will be published");
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn topic_prefix(&self) -> TopicPrefix {
        TopicPrefix::new(self.topic_prefix.clone())
    }
}

/// The prefix is joined with `/` into every topic and must not add empty
/// levels or wildcards.
fn validate_topic_prefix(prefix: &str) -> Result<(), ConfigError> {
    let invalid = prefix.trim().is_empty()
        || prefix.contains(['+', '#', '\0'])
        || prefix.starts_with('/')
        || prefix.ends_with('/');

    if invalid {
        return Err(ConfigError::InvalidTopicPrefix(prefix.to_string()));
    }
    Ok(())
}

fn validate_feed_id(id: &str) -> Result<(), ConfigError> {
    if id.trim().is_empty() {
        return Err(ConfigError::EmptyFeedId);
    }

    match id.chars().find(|c| RESERVED_ID_CHARS.contains(c)) {
        Some(reserved) => Err(ConfigError::ReservedCharInFeedId {
            id: id.to_string(),
            reserved,
        }),
        None => Ok(()),
    }
}

/// Splits `host:port`, accepting bracketed IPv6 hosts.
fn split_address(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}

fn hostname() -> String {
    let found = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    found.unwrap_or_else(|| {
        tracing::warn!(
            "Could not determine hostname, using client id suffix \"unknown\"; \
             set mqtt.client_id when running several instances"
        );
        "unknown".to_string()
    })
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_topic_prefix() -> String {
    TopicPrefix::DEFAULT.to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const MINIMAL: &str = r#"
[mqtt]
address = "localhost:1883"

[[feeds]]
id = "news"
url = "https://example.com/rss"
"#;

    #[test]
    fn test_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.max_line_length, 100);
        assert_eq!(config.topic_prefix, "rss-to-homeassistant");
        assert_eq!(config.mqtt.host(), "localhost");
        assert_eq!(config.mqtt.port(), 1883);
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.feeds[0].item_display_limit, None);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
poll_interval_secs = 300
max_line_length = 60
topic_prefix = "rss"

[mqtt]
address = "192.168.1.2:1884"
client_id = "rss-bridge"
username = "hass"
password = "hunter2"

[[feeds]]
id = "news"
url = "https://example.com/rss"
item_display_limit = 3

[[feeds]]
id = "blog"
url = "http://blog.example.org/atom.xml"
"#;

        let config = Config::parse(content).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.max_line_length, 60);
        assert_eq!(config.topic_prefix().as_str(), "rss");
        assert_eq!(config.mqtt.host(), "192.168.1.2");
        assert_eq!(config.mqtt.port(), 1884);
        assert_eq!(config.mqtt.client_id(), "rss-bridge");
        assert_eq!(config.mqtt.username.as_deref(), Some("hass"));
        assert_eq!(
            config.mqtt.password.as_ref().map(|p| p.expose_secret()),
            Some("hunter2")
        );
        assert_eq!(config.feeds[0].item_display_limit, Some(3));
        assert_eq!(config.feeds[1].id, "blog");
    }

    #[test]
    fn test_debug_masks_password() {
        let content = r#"
[mqtt]
address = "broker:1883"
password = "super-secret-password"
"#;
        let config = Config::parse(content).unwrap();
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-password"));
    }

    #[test]
    fn test_dash_in_feed_id_rejected() {
        let content = r#"
[mqtt]
address = "localhost:1883"

[[feeds]]
id = "my-feed"
url = "https://example.com/rss"
"#;
        let err = Config::parse(content).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ReservedCharInFeedId { reserved: '-', .. }
        ));
        assert!(err.to_string().contains("cannot contain '-'"));
    }

    #[test]
    fn test_topic_wildcard_in_feed_id_rejected() {
        let content = r#"
[mqtt]
address = "localhost:1883"

[[feeds]]
id = "a/b"
url = "https://example.com/rss"
"#;
        assert!(matches!(
            Config::parse(content),
            Err(ConfigError::ReservedCharInFeedId { reserved: '/', .. })
        ));
    }

    #[test]
    fn test_empty_feed_id_rejected() {
        let content = r#"
[mqtt]
address = "localhost:1883"

[[feeds]]
id = ""
url = "https://example.com/rss"
"#;
        assert!(matches!(Config::parse(content), Err(ConfigError::EmptyFeedId)));
    }

    #[test]
    fn test_duplicate_feed_id_rejected() {
        let content = r#"
[mqtt]
address = "localhost:1883"

[[feeds]]
id = "news"
url = "https://example.com/rss"

[[feeds]]
id = "news"
url = "https://example.com/other"
"#;
        assert!(matches!(
            Config::parse(content),
            Err(ConfigError::DuplicateFeedId(id)) if id == "news"
        ));
    }

    #[test]
    fn test_bad_feed_url_rejected() {
        let content = r#"
[mqtt]
address = "localhost:1883"

[[feeds]]
id = "news"
url = "file:///etc/passwd"
"#;
        assert!(matches!(
            Config::parse(content),
            Err(ConfigError::InvalidFeedUrl { id, .. }) if id == "news"
        ));
    }

    #[test]
    fn test_bad_broker_address_rejected() {
        for address in ["broker", "broker:port", ":1883", "broker:99999"] {
            let content = format!("[mqtt]\naddress = \"{}\"\n", address);
            assert!(
                matches!(
                    Config::parse(&content),
                    Err(ConfigError::InvalidBrokerAddress(_))
                ),
                "address {:?} should be rejected",
                address
            );
        }
    }

    #[test]
    fn test_ipv6_broker_address() {
        let config = Config::parse("[mqtt]\naddress = \"[::1]:1883\"\n").unwrap();
        assert_eq!(config.mqtt.host(), "::1");
        assert_eq!(config.mqtt.port(), 1883);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            Config::parse("poll_interval_secs = 0\n[mqtt]\naddress = \"broker:1883\"\n"),
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = "topic_prefix = \"rss\"\ntotally_fake_key = \"should not fail\"\n[mqtt]\naddress = \"broker:1883\"\n";
        assert!(Config::parse(content).is_ok());
    }

    #[test]
    fn test_unknown_feed_key_rejected() {
        let content = r#"
[mqtt]
address = "localhost:1883"

[[feeds]]
id = "news"
url = "https://example.com/rss"
item_display_limt = 3
"#;
        let err = Config::parse(content).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("item_display_limt"));
    }

    #[test]
    fn test_unknown_mqtt_key_rejected() {
        let content = "[mqtt]\naddress = \"broker:1883\"\nuser = \"hass\"\n";
        assert!(matches!(Config::parse(content), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_mqtt_section_rejected() {
        let err = Config::parse(MINIMAL.replace("[mqtt]\naddress = \"localhost:1883\"\n", "").as_str())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("mqtt"));
    }

    #[test]
    fn test_missing_broker_address_rejected() {
        let err = Config::parse("[mqtt]\nusername = \"hass\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn test_default_client_id_has_hostname_suffix() {
        let config = Config::parse(MINIMAL).unwrap();
        let client_id = config.mqtt.client_id();
        let suffix = client_id.strip_prefix("rss-to-homeassistant-").unwrap();
        assert!(!suffix.is_empty());
        assert_eq!(suffix, hostname());
    }

    #[test]
    fn test_bad_topic_prefix_rejected() {
        for prefix in ["", "  ", "home/#", "home/+/rss", "/rss", "rss/"] {
            let content = format!(
                "topic_prefix = \"{}\"\n[mqtt]\naddress = \"broker:1883\"\n",
                prefix
            );
            assert!(
                matches!(
                    Config::parse(&content),
                    Err(ConfigError::InvalidTopicPrefix(p)) if p == prefix
                ),
                "prefix {:?} should be rejected",
                prefix
            );
        }
    }

    #[test]
    fn test_nested_topic_prefix_accepted() {
        let config =
            Config::parse("topic_prefix = \"home/rss\"\n[mqtt]\naddress = \"broker:1883\"\n").unwrap();
        assert_eq!(config.topic_prefix().as_str(), "home/rss");
    }

    #[test]
    fn test_missing_file_is_error() {
        let path = Path::new("/tmp/rss_to_hass_test_nonexistent_config.toml");
        assert!(matches!(Config::load(path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join("rss_to_hass_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feeds[0].id, "news");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("rss_to_hass_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
