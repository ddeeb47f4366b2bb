//! In-memory broker with Kafka-like group offsets, used in place of a real
//! cluster by tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::brokers::{EventPublisher, EventSubscriber};
use crate::error::{EventBusError, Result};
use crate::event::{ConsumedRecord, DeliveryReceipt, PollOutcome};

const BROKER_ADDRESS: &str = "in-memory";
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Default)]
struct BrokerState {
    /// Single-partition log per topic
    topics: HashMap<String, Vec<Vec<u8>>>,
    /// Next offset to read, per (topic, group)
    committed: HashMap<(String, String), usize>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<BrokerState>,
    appended: Notify,
    reject_publishes: AtomicBool,
    unreachable: AtomicBool,
    publisher_closes: AtomicUsize,
    subscriber_closes: AtomicUsize,
}

/// Shared handle to an in-memory broker. Clones see the same topics.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail as if the broker never acknowledged.
    pub fn reject_publishes(&self, reject: bool) {
        self.shared.reject_publishes.store(reject, Ordering::SeqCst);
    }

    /// Make subsequent `subscribe` calls fail with a connection error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.shared.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Append raw bytes to a topic, bypassing UTF-8 handling.
    pub fn append_raw(&self, topic: &str, payload: Vec<u8>) -> DeliveryReceipt {
        let offset = {
            let mut state = self.shared.state.lock();
            let log = state.topics.entry(topic.to_string()).or_default();
            log.push(payload);
            log.len() - 1
        };
        self.shared.appended.notify_waiters();

        DeliveryReceipt {
            topic: topic.to_string(),
            partition: 0,
            offset: offset as i64,
        }
    }

    /// Payloads currently stored on a topic, lossily decoded.
    pub fn records(&self, topic: &str) -> Vec<String> {
        let state = self.shared.state.lock();
        state
            .topics
            .get(topic)
            .map(|log| {
                log.iter()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Offset the group will read next on `topic`.
    pub fn committed_offset(&self, topic: &str, group_id: &str) -> usize {
        let state = self.shared.state.lock();
        state
            .committed
            .get(&(topic.to_string(), group_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn publisher_closes(&self) -> usize {
        self.shared.publisher_closes.load(Ordering::SeqCst)
    }

    pub fn subscriber_closes(&self) -> usize {
        self.shared.subscriber_closes.load(Ordering::SeqCst)
    }

    /// Join `group_id` on `topic`. A new group starts from the earliest
    /// record; a known group resumes from its committed offset.
    pub fn subscribe(&self, topic: &str, group_id: &str) -> Result<InMemorySubscriber> {
        if self.shared.unreachable.load(Ordering::SeqCst) {
            return Err(EventBusError::BrokerConnection {
                broker: BROKER_ADDRESS.to_string(),
                cause: "broker unreachable".to_string(),
            });
        }

        self.shared
            .state
            .lock()
            .committed
            .entry((topic.to_string(), group_id.to_string()))
            .or_insert(0);

        Ok(InMemorySubscriber {
            broker: self.clone(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            closed: false,
        })
    }

    /// Take the next record for the group, advancing its committed offset.
    fn next_for(&self, topic: &str, group_id: &str) -> Option<(usize, Vec<u8>)> {
        let mut state = self.shared.state.lock();
        let BrokerState { topics, committed } = &mut *state;
        let next = committed
            .entry((topic.to_string(), group_id.to_string()))
            .or_insert(0);
        let payload = topics.get(topic)?.get(*next)?.clone();
        let offset = *next;
        *next += 1;
        Some((offset, payload))
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<DeliveryReceipt> {
        if self.shared.reject_publishes.load(Ordering::SeqCst) {
            return Err(EventBusError::Publish {
                topic: topic.to_string(),
                cause: "broker did not acknowledge".to_string(),
            });
        }
        let receipt = self.append_raw(topic, payload.as_bytes().to_vec());
        debug!(topic, offset = receipt.offset, "Record appended");
        Ok(receipt)
    }

    async fn close(&self) -> Result<()> {
        self.shared.publisher_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Subscription handle on an [`InMemoryBroker`].
pub struct InMemorySubscriber {
    broker: InMemoryBroker,
    topic: String,
    group_id: String,
    poll_timeout: Duration,
    closed: bool,
}

impl InMemorySubscriber {
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

#[async_trait]
impl EventSubscriber for InMemorySubscriber {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn poll(&mut self, cancel: &CancellationToken) -> Result<PollOutcome> {
        if self.closed {
            return Err(EventBusError::SubscriptionClosed {
                topic: self.topic.clone(),
            });
        }

        // Register for wake-ups before looking at the log so an append between
        // the check and the wait is not missed.
        let appended = self.broker.shared.appended.notified();
        tokio::pin!(appended);
        appended.as_mut().enable();

        if let Some((offset, payload)) = self.broker.next_for(&self.topic, &self.group_id) {
            return decode(&self.topic, offset, payload).map(PollOutcome::Record);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(PollOutcome::Cancelled),
            _ = &mut appended => match self.broker.next_for(&self.topic, &self.group_id) {
                Some((offset, payload)) => decode(&self.topic, offset, payload).map(PollOutcome::Record),
                None => Ok(PollOutcome::Timeout),
            },
            _ = tokio::time::sleep(self.poll_timeout) => Ok(PollOutcome::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.broker
                .shared
                .subscriber_closes
                .fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn decode(topic: &str, offset: usize, payload: Vec<u8>) -> Result<ConsumedRecord> {
    let offset = offset as i64;
    let value = String::from_utf8(payload).map_err(|_| EventBusError::Deserialization {
        topic: topic.to_string(),
        partition: 0,
        offset,
    })?;

    Ok(ConsumedRecord {
        value,
        topic: topic.to_string(),
        partition: 0,
        offset,
        timestamp_ms: None,
    })
}
