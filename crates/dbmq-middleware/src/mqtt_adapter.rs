//! MQTT transport built on `rumqttc`.
//!
//! [`connect`] returns two halves:
//!
//! * [`MqttPublisher`] – the [`BrokerPublisher`] used by the bus→broker loop.
//! * [`MqttPump`] – drives the `rumqttc` event loop, (re)subscribes to the
//!   command topics after every `ConnAck` and feeds inbound publishes into the
//!   broker→bus inbox.

use std::time::Duration;

use async_trait::async_trait;
use dbmq_types::{BridgeError, BrokerMessage};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS, SubscribeFilter};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::BrokerPublisher;
use crate::inbox::{InboxSender, OfferError};

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 10;

/// Connection parameters for the broker.
#[derive(Clone, Default)]
pub struct MqttSettings {
    /// `tcp://host:port`, `mqtt://host:port`, `host:port` or `host`.
    pub server: String,
    /// Empty means a random `dbmq-<uuid>` id.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSettings")
            .field("server", &self.server)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Split a broker URL into host and port.
///
/// # Errors
///
/// [`BridgeError::Config`] for schemes other than `tcp`/`mqtt`, an empty host
/// or a port that is not a `u16`.
pub fn parse_server(url: &str) -> Result<(String, u16), BridgeError> {
    let rest = match url.split_once("://") {
        Some(("tcp" | "mqtt", rest)) => rest,
        Some((scheme, _)) => {
            return Err(BridgeError::Config(format!(
                "unsupported mqtt scheme '{scheme}' in '{url}'"
            )));
        }
        None => url,
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| BridgeError::Config(format!("invalid mqtt port in '{url}': {e}")))?;
            (host, port)
        }
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(BridgeError::Config(format!("missing mqtt host in '{url}'")));
    }
    Ok((host.to_string(), port))
}

/// Create the client and its event loop. Nothing touches the network until
/// [`MqttPump::run`] polls.
pub fn connect(
    settings: &MqttSettings,
    command_topics: Vec<String>,
    inbox: InboxSender<BrokerMessage>,
) -> Result<(MqttPublisher, MqttPump), BridgeError> {
    let (host, port) = parse_server(&settings.server)?;
    let client_id = if settings.client_id.is_empty() {
        format!("dbmq-{}", Uuid::new_v4())
    } else {
        settings.client_id.clone()
    };

    let mut options = MqttOptions::new(client_id.clone(), host.clone(), port);
    options.set_keep_alive(KEEP_ALIVE);
    if let Some(username) = &settings.username {
        options.set_credentials(username.clone(), settings.password.clone().unwrap_or_default());
    }

    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    info!(host = %host, port, client_id = %client_id, "mqtt client created");

    Ok((
        MqttPublisher {
            client: client.clone(),
        },
        MqttPump {
            client,
            eventloop,
            command_topics,
            inbox,
        },
    ))
}

/// Publishes at QoS 0, never retained.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

#[async_trait]
impl BrokerPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.into_bytes())
            .await
            .map_err(|e| BridgeError::DeliveryFailed(format!("mqtt publish to '{topic}': {e}")))
    }
}

/// Owner of the `rumqttc` event loop.
pub struct MqttPump {
    client: AsyncClient,
    eventloop: EventLoop,
    command_topics: Vec<String>,
    inbox: InboxSender<BrokerMessage>,
}

impl MqttPump {
    /// Poll the broker connection until the broker→bus inbox closes.
    ///
    /// Connection errors are logged and retried after a short pause;
    /// `rumqttc` reconnects on the next poll.
    pub async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, "mqtt connected");
                    self.subscribe_all();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(topic = %publish.topic, bytes = publish.payload.len(), "mqtt message");
                    if self.inbox.offer(to_broker_message(&publish)) == Err(OfferError::Closed) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "mqtt connection error, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
        info!("mqtt pump stopped");
    }

    /// Queue one SUBSCRIBE carrying every command topic.
    ///
    /// The request queue is only drained by `poll`, which this task is not
    /// running right now, so the whole topic list has to fit in a single slot.
    fn subscribe_all(&self) -> bool {
        if self.command_topics.is_empty() {
            return true;
        }
        let filters = self
            .command_topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce));
        match self.client.try_subscribe_many(filters) {
            Ok(()) => {
                info!(topics = ?self.command_topics, "mqtt subscribed");
                true
            }
            Err(e) => {
                warn!(topics = self.command_topics.len(), error = %e, "mqtt subscribe failed");
                false
            }
        }
    }
}

fn to_broker_message(publish: &Publish) -> BrokerMessage {
    BrokerMessage::new(publish.topic.clone(), publish.payload.to_vec())
}
