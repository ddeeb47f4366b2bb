// Broker client traits (Kafka and in-memory implementations)

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::event::{DeliveryReceipt, PollOutcome};

/// Publishing side of a broker connection.
///
/// One instance is shared by every request in the process, so implementations
/// must tolerate concurrent `publish` calls.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Append `payload` to `topic` without a key.
    ///
    /// Resolves only after the broker acknowledged the record. Failures are
    /// returned to the caller and never retried here.
    async fn publish(&self, topic: &str, payload: &str) -> Result<DeliveryReceipt>;

    /// Flush outstanding records and release the connection.
    async fn close(&self) -> Result<()>;
}

/// Consuming side of a broker connection, bound to one topic and group.
///
/// Owned by a single task; `poll` takes `&mut self` so only one poll can be
/// outstanding at a time.
#[async_trait]
pub trait EventSubscriber: Send {
    fn topic(&self) -> &str;

    fn group_id(&self) -> &str;

    /// Wait for the next record, the poll timeout, or `cancel`.
    ///
    /// Cancellation is reported as [`PollOutcome::Cancelled`], not as an error.
    async fn poll(&mut self, cancel: &CancellationToken) -> Result<PollOutcome>;

    /// Leave the group and release the handle. Polling afterwards is an error.
    async fn close(&mut self) -> Result<()>;
}
