// Record handlers invoked by consumers
use crate::event::ConsumedRecord;

/// Observation sink for consumed records.
pub trait RecordHandler: Send + Sync {
    fn handle(&self, record: &ConsumedRecord);
}

impl<F> RecordHandler for F
where
    F: Fn(&ConsumedRecord) + Send + Sync,
{
    fn handle(&self, record: &ConsumedRecord) {
        self(record)
    }
}
