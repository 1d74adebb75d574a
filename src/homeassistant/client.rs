use super::entity::SensorEntity;
use super::{Attributes, Publisher};
use crate::config::MqttConfig;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use secrecy::ExposeSecret;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Requests buffered between publishers and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// Establishing the broker connection failed. Always fatal at startup.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("MQTT connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("MQTT broker refused connection: {0:?}")]
    Refused(ConnectReturnCode),
    #[error("MQTT broker did not acknowledge connection within {0:?}")]
    Timeout(Duration),
    #[error("MQTT connect cancelled")]
    Cancelled,
}

/// A publish to the broker did not go through.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The entity was built without an attributes topic.
    #[error("PublishAttributes: no attribute topic for {0}")]
    NoAttributesTopic(String),
    #[error("PublishAttributes: failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("PublishAttributes: {0}")]
    Transport(#[from] rumqttc::ClientError),
    #[error("AutodiscoverEntities: {entity}: {source}")]
    Discovery {
        entity: String,
        #[source]
        source: rumqttc::ClientError,
    },
    #[error("publish cancelled")]
    Cancelled,
}

/// Handle to the single broker connection of this process.
///
/// Cloning is cheap and every clone shares the same connection. Publishes
/// are queued onto the event loop's request channel, so concurrent calls
/// from many poll tasks need no external locking.
#[derive(Clone, Debug)]
pub struct MqttClient {
    client: AsyncClient,
}

impl MqttClient {
    /// Connects to the broker and waits for its CONNACK.
    ///
    /// On success the event loop is moved onto a background task which keeps
    /// the connection alive and reconnects after errors. Pass the returned
    /// handle to [`disconnect`](Self::disconnect) on shutdown.
    ///
    /// # Errors
    ///
    /// Any failure before the broker acknowledges the session is returned as
    /// a [`BrokerError`]; nothing is retried.
    pub async fn connect(
        config: &MqttConfig,
        cancel: &CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), BrokerError> {
        let (client, mut eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);

        tracing::debug!(address = %config.address, client_id = %config.client_id(), "Connecting to MQTT broker");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
            result = tokio::time::timeout(CONNECT_TIMEOUT, wait_for_connack(&mut eventloop)) => {
                result.map_err(|_| BrokerError::Timeout(CONNECT_TIMEOUT))??;
            }
        }

        tracing::info!(address = %config.address, "Connected to MQTT broker");

        let driver = tokio::spawn(drive(eventloop));
        Ok((Self { client }, driver))
    }

    /// Wraps an existing client. The caller is responsible for polling the
    /// matching [`EventLoop`].
    pub fn from_client(client: AsyncClient) -> Self {
        Self { client }
    }

    /// Announces every entity on its discovery topic.
    ///
    /// Stops at the first entity whose publish fails. Entities announced
    /// before the failure stay announced; a restart re-sends all of them.
    pub async fn announce_discovery(&self, entities: &[SensorEntity]) -> Result<(), PublishError> {
        for entity in entities {
            let message = entity.discovery_message()?;
            self.client
                .publish(entity.discovery_topic(), QoS::AtMostOnce, false, message)
                .await
                .map_err(|source| PublishError::Discovery {
                    entity: entity.id().to_string(),
                    source,
                })?;
            tracing::debug!(entity = %entity.id(), topic = %entity.discovery_topic(), "Announced entity");
        }

        Ok(())
    }

    /// Publishes `attributes` as a flat JSON object to the entity's
    /// attributes topic. Not retained.
    pub async fn publish_attributes(
        &self,
        entity: &SensorEntity,
        attributes: &Attributes,
    ) -> Result<(), PublishError> {
        let (topic, payload) = encode_attributes(entity, attributes)?;

        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;

        Ok(())
    }

    /// Sends DISCONNECT and waits briefly for the event loop to flush it.
    pub async fn disconnect(&self, driver: JoinHandle<()>) {
        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(error = %e, "Failed to queue MQTT disconnect");
        }

        let abort = driver.abort_handle();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, driver).await.is_err() {
            tracing::warn!("MQTT event loop did not stop in time, aborting");
            abort.abort();
        }
    }
}

impl Publisher for MqttClient {
    async fn publish_attributes(
        &self,
        entity: &SensorEntity,
        attributes: &Attributes,
    ) -> Result<(), PublishError> {
        MqttClient::publish_attributes(self, entity, attributes).await
    }
}

/// Resolves the attributes topic and serializes the payload.
///
/// Keys are emitted in sorted order.
pub fn encode_attributes<'a>(
    entity: &'a SensorEntity,
    attributes: &Attributes,
) -> Result<(&'a str, Vec<u8>), PublishError> {
    let topic = entity
        .attributes_topic()
        .ok_or_else(|| PublishError::NoAttributesTopic(entity.id().to_string()))?;

    Ok((topic, serde_json::to_vec(attributes)?))
}

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id(), config.host(), config.port());
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if let Some(username) = &config.username {
        let password = config
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_owned())
            .unwrap_or_default();
        options.set_credentials(username.clone(), password);
    }

    options
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), BrokerError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            return match ack.code {
                ConnectReturnCode::Success => Ok(()),
                code => Err(BrokerError::Refused(code)),
            };
        }
    }
}

/// Keeps the event loop polled until our own DISCONNECT goes out.
///
/// Errors are logged and followed by a pause; the next poll reconnects.
async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
                break;
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "MQTT session re-established");
            }
            Ok(event) => {
                tracing::trace!(?event, "MQTT event");
            }
            Err(e) => {
                tracing::error!(error = %e, "mqtt");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
