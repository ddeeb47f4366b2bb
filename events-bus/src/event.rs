// Record types exchanged with the broker

/// Acknowledgement returned once the broker has accepted a published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A record read from a topic. Transient: handed to a handler, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    /// UTF-8 payload, free text
    pub value: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Broker timestamp in milliseconds since the epoch, when available
    pub timestamp_ms: Option<i64>,
}

/// Result of a single poll that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Record(ConsumedRecord),
    /// Nothing arrived within the poll timeout
    Timeout,
    /// The cancellation signal fired while waiting
    Cancelled,
}

