//! Topic log client for the greeter relay
//!
//! This crate hides the broker behind two capabilities:
//! - **Publish**: append a UTF-8 payload to a topic and wait for the broker's
//!   acknowledgement ([`EventPublisher`])
//! - **Subscribe/poll**: join a consumer group on a topic and pull records one
//!   at a time, with cooperative cancellation ([`EventSubscriber`])
//!
//! # Backends
//!
//! - **Kafka** ([`KafkaPublisher`], [`KafkaSubscriber`]) via `rdkafka`
//! - **In-memory** ([`InMemoryBroker`]) with per-group committed offsets, for
//!   tests and local runs
//!
//! # Error classes
//!
//! Connection failures are fatal for the owning role. Consume and decode
//! errors affect a single record. Publish failures are returned to the caller
//! without retry.
//!
//! # Example
//!
//! ```rust,no_run
//! use events_bus::{EventPublisher, EventSubscriber, KafkaConfig, KafkaPublisher, KafkaSubscriber};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KafkaConfig::from_env()?;
//!
//!     let publisher = KafkaPublisher::connect(&config).await?;
//!     publisher.publish("greetings", "Hello Bob").await?;
//!
//!     let mut subscriber = KafkaSubscriber::subscribe(&config, "greetings", "serviceB-group").await?;
//!     let outcome = subscriber.poll(&CancellationToken::new()).await?;
//!     println!("{outcome:?}");
//!
//!     subscriber.close().await?;
//!     publisher.close().await?;
//!     Ok(())
//! }
//! ```

pub mod brokers;
pub mod config;
pub mod error;
pub mod event;
pub mod handlers;
pub mod kafka;
pub mod memory;

pub use brokers::*;
pub use self::config::*;
pub use error::*;
pub use event::*;
pub use handlers::*;
pub use kafka::*;
pub use memory::*;
