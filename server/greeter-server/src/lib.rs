//! Greeter relay services
//!
//! Two roles share this crate and communicate only through the `greetings`
//! topic:
//! - **Service A** (`greeter-publisher`): answers `SayHello` after publishing
//!   `Hello {name} from Service A at {timestamp}` and receiving the broker's
//!   acknowledgement
//! - **Service B** (`greeter-consumer`): consumes the topic under the
//!   `serviceB-group` consumer group, logging each record, and answers
//!   `SayHello` with a local echo
//!
//! Each role also serves a small HTTP health surface (`/` and `/ready`).

pub mod config;
pub mod consumer;
pub mod greeting;
pub mod grpc;
pub mod health;
pub mod publisher;
pub mod server;

pub use config::{ServiceArgs, CONSUMER_GROUP_ID, GREETINGS_TOPIC};
pub use consumer::{ConsumerHandle, ConsumerLoop, LoggingHandler, LoopState};
pub use greeting::GreetingEvent;
pub use grpc::{EchoGreeter, PublishingGreeter};
pub use health::{health_routes, HealthState};
pub use publisher::GreetingPublisher;
pub use server::{
    cancel_on_signal, run_consumer_service, run_publisher_service, serve_consumer,
    serve_publisher, Listeners,
};
