use serde::Serialize;

/// Namespace under which all of this process' topics live.
///
/// Topic names are derived purely from the prefix and the entity id, so the
/// hub resolves the same entity across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPrefix(String);

impl TopicPrefix {
    pub const DEFAULT: &'static str = "rss-to-homeassistant";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<prefix>/config/sensor/<id>`
    pub fn discovery_topic(&self, entity_id: &str) -> String {
        format!("{}/config/sensor/{}", self.0, entity_id)
    }

    /// `<prefix>/state/sensor/<id>`
    pub fn state_topic(&self, entity_id: &str) -> String {
        format!("{}/state/sensor/{}", self.0, entity_id)
    }

    /// `<prefix>/state/sensor/<id>/attributes`
    pub fn attributes_topic(&self, entity_id: &str) -> String {
        format!("{}/state/sensor/{}/attributes", self.0, entity_id)
    }
}

impl Default for TopicPrefix {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

/// Discovery payload sent to the hub once per process start.
///
/// Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryOptions {
    pub unique_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<String>,
}

/// A hub-visible sensor. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEntity {
    id: String,
    discovery_topic: String,
    discovery: DiscoveryOptions,
}

impl SensorEntity {
    pub fn new(id: impl Into<String>, discovery_topic: String, discovery: DiscoveryOptions) -> Self {
        Self {
            id: id.into(),
            discovery_topic,
            discovery,
        }
    }

    /// Builds the sensor that mirrors one feed.
    ///
    /// The state topic is announced but never written: state is capped at
    /// 255 characters by the hub, so the rendered Markdown travels as an
    /// attribute instead.
    pub fn for_feed(prefix: &TopicPrefix, feed_id: &str) -> Self {
        Self::new(
            feed_id,
            prefix.discovery_topic(feed_id),
            DiscoveryOptions {
                unique_id: format!("rss-{}", feed_id),
                name: format!("rss_{}", feed_id),
                state_topic: Some(prefix.state_topic(feed_id)),
                json_attributes_topic: Some(prefix.attributes_topic(feed_id)),
            },
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.discovery.name
    }

    pub fn unique_id(&self) -> &str {
        &self.discovery.unique_id
    }

    pub fn discovery_topic(&self) -> &str {
        &self.discovery_topic
    }

    pub fn state_topic(&self) -> Option<&str> {
        self.discovery.state_topic.as_deref()
    }

    pub fn attributes_topic(&self) -> Option<&str> {
        self.discovery.json_attributes_topic.as_deref()
    }

    /// JSON discovery message for [`discovery_topic`](Self::discovery_topic).
    pub fn discovery_message(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.discovery)
    }
}
