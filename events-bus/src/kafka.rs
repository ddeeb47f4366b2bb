//! Kafka clients built on `rdkafka`.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::brokers::{EventPublisher, EventSubscriber};
use crate::config::KafkaConfig;
use crate::error::{EventBusError, Result};
use crate::event::{ConsumedRecord, DeliveryReceipt, PollOutcome};

/// Kafka publisher. Cheap to share behind an `Arc`; `rdkafka` serializes
/// concurrent sends internally.
pub struct KafkaPublisher {
    producer: FutureProducer,
    config: KafkaConfig,
}

impl KafkaPublisher {
    /// Create the producer and confirm the cluster answers a metadata request.
    ///
    /// An unreachable broker is reported as [`EventBusError::BrokerConnection`].
    pub async fn connect(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = producer_config(config)
            .create()
            .map_err(|e| connection_error(config, &e))?;

        let handle = producer.clone();
        let timeout = config.connect_timeout();
        let brokers = tokio::task::spawn_blocking(move || {
            handle
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| EventBusError::BrokerConnection {
            broker: config.bootstrap_servers.clone(),
            cause: e.to_string(),
        })?
        .map_err(|e| connection_error(config, &e))?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            client_id = %config.client_id,
            brokers,
            "Kafka publisher connected"
        );

        Ok(Self {
            producer,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    #[instrument(skip(self, payload), fields(payload_size = payload.len()))]
    async fn publish(&self, topic: &str, payload: &str) -> Result<DeliveryReceipt> {
        let record = FutureRecord::<(), str>::to(topic).payload(payload);

        // Back-pressure on a full local queue; delivery itself is bounded by
        // message.timeout.ms.
        let (partition, offset) = self
            .producer
            .send(record, Timeout::Never)
            .await
            .map_err(|(err, _)| EventBusError::Publish {
                topic: topic.to_string(),
                cause: err.to_string(),
            })?;

        debug!(partition, offset, "Record acknowledged");

        Ok(DeliveryReceipt {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }

    async fn close(&self) -> Result<()> {
        let producer = self.producer.clone();
        let timeout = Duration::from_millis(self.config.message_timeout_ms);
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| EventBusError::Publish {
                topic: "*".to_string(),
                cause: format!("flush task failed: {e}"),
            })?
            .map_err(|e| EventBusError::Publish {
                topic: "*".to_string(),
                cause: format!("flush on close failed: {e}"),
            })?;
        info!(client_id = %self.config.client_id, "Kafka publisher closed");
        Ok(())
    }
}

/// Kafka subscriber for one topic under a fixed consumer group.
pub struct KafkaSubscriber {
    consumer: Option<StreamConsumer>,
    topic: String,
    group_id: String,
    bootstrap_servers: String,
    poll_timeout: Duration,
}

impl KafkaSubscriber {
    /// Create the consumer, check the cluster is reachable and subscribe to `topic`.
    ///
    /// The group starts from the earliest offset on its first run and from its
    /// last committed offset afterwards.
    pub async fn subscribe(config: &KafkaConfig, topic: &str, group_id: &str) -> Result<Self> {
        let client_config = consumer_config(config, group_id);
        let metadata_topic = topic.to_string();
        let timeout = config.connect_timeout();
        let consumer = tokio::task::spawn_blocking(move || -> KafkaResult<StreamConsumer> {
            let consumer: StreamConsumer = client_config.create()?;
            consumer.fetch_metadata(Some(&metadata_topic), timeout)?;
            Ok(consumer)
        })
        .await
        .map_err(|e| EventBusError::BrokerConnection {
            broker: config.bootstrap_servers.clone(),
            cause: e.to_string(),
        })?
        .map_err(|e| connection_error(config, &e))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| EventBusError::Subscription {
                topic: topic.to_string(),
                cause: e.to_string(),
            })?;

        info!(
            topic,
            group_id,
            bootstrap_servers = %config.bootstrap_servers,
            "Subscribed to topic"
        );

        Ok(Self {
            consumer: Some(consumer),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            bootstrap_servers: config.bootstrap_servers.clone(),
            poll_timeout: config.poll_timeout(),
        })
    }
}

#[async_trait]
impl EventSubscriber for KafkaSubscriber {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn poll(&mut self, cancel: &CancellationToken) -> Result<PollOutcome> {
        let consumer = self
            .consumer
            .as_ref()
            .ok_or_else(|| EventBusError::SubscriptionClosed {
                topic: self.topic.clone(),
            })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(PollOutcome::Cancelled),
            received = tokio::time::timeout(self.poll_timeout, consumer.recv()) => match received {
                Err(_) => Ok(PollOutcome::Timeout),
                Ok(Ok(message)) => decode(&message).map(PollOutcome::Record),
                Ok(Err(e)) => Err(consume_error(&self.bootstrap_servers, &self.topic, e)),
            },
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            drop(consumer);
            info!(topic = %self.topic, group_id = %self.group_id, "Kafka subscriber closed");
        }
        Ok(())
    }
}

fn producer_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("client.id", &config.client_id)
        .set("message.timeout.ms", config.message_timeout_ms.to_string())
        .set("acks", "all");
    client_config
}

fn consumer_config(config: &KafkaConfig, group_id: &str) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("client.id", &config.client_id)
        .set("group.id", group_id)
        .set("auto.offset.reset", "earliest")
        .set("enable.auto.commit", "true")
        .set("session.timeout.ms", config.session_timeout_ms.to_string());
    client_config
}

fn decode(message: &BorrowedMessage<'_>) -> Result<ConsumedRecord> {
    let value = match message.payload_view::<str>() {
        None => String::new(),
        Some(Ok(text)) => text.to_string(),
        Some(Err(_)) => {
            return Err(EventBusError::Deserialization {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            })
        }
    };

    Ok(ConsumedRecord {
        value,
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        timestamp_ms: message.timestamp().to_millis(),
    })
}

fn connection_error(config: &KafkaConfig, err: &KafkaError) -> EventBusError {
    EventBusError::BrokerConnection {
        broker: config.bootstrap_servers.clone(),
        cause: err.to_string(),
    }
}

fn consume_error(broker: &str, topic: &str, err: KafkaError) -> EventBusError {
    // Transport errors, including all brokers down, clear once librdkafka
    // reconnects; only unrecoverable client states end consumption.
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::Fatal | RDKafkaErrorCode::Authentication) => {
            EventBusError::BrokerConnection {
                broker: broker.to_string(),
                cause: err.to_string(),
            }
        }
        _ => {
            warn!(topic, error = %err, "Kafka consume error");
            EventBusError::Consume {
                topic: topic.to_string(),
                cause: err.to_string(),
            }
        }
    }
}
