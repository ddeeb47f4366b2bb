use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Broker connection to {broker} failed: {cause}")]
    BrokerConnection { broker: String, cause: String },

    #[error("Publishing to topic {topic} failed: {cause}")]
    Publish { topic: String, cause: String },

    #[error("Subscribing to topic {topic} failed: {cause}")]
    Subscription { topic: String, cause: String },

    #[error("Consuming from topic {topic} failed: {cause}")]
    Consume { topic: String, cause: String },

    #[error("Record {topic}/{partition}@{offset} is not valid UTF-8")]
    Deserialization {
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("Subscription to topic {topic} is closed")]
    SubscriptionClosed { topic: String },

    #[error("Invalid broker configuration: {0}")]
    Config(String),
}

impl EventBusError {
    /// Fatal errors end the owning role: the broker is gone or the handle is
    /// unusable. Everything else is scoped to one publish or one record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BrokerConnection { .. }
                | Self::Subscription { .. }
                | Self::SubscriptionClosed { .. }
                | Self::Config(_)
        )
    }
}

impl From<config::ConfigError> for EventBusError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EventBusError>;
