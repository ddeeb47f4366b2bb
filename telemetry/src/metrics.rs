// Relay counters exposed through the `metrics` facade
use metrics::{counter, describe_counter};

pub const MESSAGES_PUBLISHED: &str = "greeter_messages_published_total";
pub const PUBLISH_FAILURES: &str = "greeter_publish_failures_total";
pub const MESSAGES_RECEIVED: &str = "greeter_messages_received_total";
pub const CONSUME_ERRORS: &str = "greeter_consume_errors_total";

/// Register descriptions with whichever recorder is installed
pub fn describe_metrics() {
    describe_counter!(MESSAGES_PUBLISHED, "Records acknowledged by the broker");
    describe_counter!(PUBLISH_FAILURES, "Publishes the broker did not acknowledge");
    describe_counter!(MESSAGES_RECEIVED, "Records delivered to the observation sink");
    describe_counter!(CONSUME_ERRORS, "Records skipped after a consume or decode error");
}

pub fn record_published(topic: &str) {
    counter!(MESSAGES_PUBLISHED, "topic" => topic.to_string()).increment(1);
}

pub fn record_publish_failure(topic: &str) {
    counter!(PUBLISH_FAILURES, "topic" => topic.to_string()).increment(1);
}

pub fn record_received(topic: &str) {
    counter!(MESSAGES_RECEIVED, "topic" => topic.to_string()).increment(1);
}

pub fn record_consume_error(topic: &str) {
    counter!(CONSUME_ERRORS, "topic" => topic.to_string()).increment(1);
}
