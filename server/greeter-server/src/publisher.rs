use std::sync::Arc;

use events_bus::{DeliveryReceipt, EventBusError, EventPublisher};
use tracing::{debug, instrument, warn};

use crate::greeting::{publisher_reply, GreetingEvent};

/// Turns one greeting request into one published event.
///
/// Holds the process-wide publisher handle; clones share it.
#[derive(Clone)]
pub struct GreetingPublisher {
    client: Arc<dyn EventPublisher>,
    topic: String,
}

impl GreetingPublisher {
    pub fn new(client: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }

    /// Publish the greeting for `name` and build the reply.
    ///
    /// The reply is only produced after the broker acknowledged the event;
    /// a publish failure is returned as is and never retried.
    #[instrument(skip(self), fields(topic = %self.topic))]
    pub async fn handle_greeting(&self, name: &str) -> Result<String, EventBusError> {
        let event = GreetingEvent::now(name);
        self.publish(&event).await?;
        Ok(publisher_reply(name))
    }

    pub async fn publish(&self, event: &GreetingEvent) -> Result<DeliveryReceipt, EventBusError> {
        match self.client.publish(&self.topic, &event.rendered_text).await {
            Ok(receipt) => {
                debug!(
                    partition = receipt.partition,
                    offset = receipt.offset,
                    "Greeting event published"
                );
                telemetry::record_published(&self.topic);
                Ok(receipt)
            }
            Err(e) => {
                warn!(error = %e, "Greeting event was not acknowledged");
                telemetry::record_publish_failure(&self.topic);
                Err(e)
            }
        }
    }
}
