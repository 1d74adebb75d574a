//! Home Assistant MQTT integration.
//!
//! Entities are announced once per process start on their discovery topic;
//! afterwards their content is pushed as JSON attributes.
//!
//! - [`entity`] - sensor identity and topic naming
//! - [`client`] - the broker connection and its publish operations

mod client;
mod entity;

use std::collections::BTreeMap;
use std::future::Future;

pub use client::{encode_attributes, BrokerError, MqttClient, PublishError};
pub use entity::{DiscoveryOptions, SensorEntity, TopicPrefix};

/// Attribute map sent on an entity's attributes topic. Ordered so the
/// serialized payload is stable.
pub type Attributes = BTreeMap<String, String>;

/// Publishes entity attributes. Implemented by [`MqttClient`]; poll tasks
/// only depend on this trait.
pub trait Publisher: Send + Sync {
    fn publish_attributes(
        &self,
        entity: &SensorEntity,
        attributes: &Attributes,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}
