//! Background loop draining the greetings topic for the life of the process.

use std::fmt;
use std::sync::Arc;

use events_bus::{ConsumedRecord, EventBusError, EventSubscriber, PollOutcome, RecordHandler};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use error_common::{RelayError, Result as RelayResult};

/// Lifecycle of the consumer loop. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Production observation sink: one log line and one counter per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl RecordHandler for LoggingHandler {
    fn handle(&self, record: &ConsumedRecord) {
        info!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "{}",
            observation_line(&record.value)
        );
        telemetry::record_received(&record.topic);
    }
}

/// Text surfaced for each consumed value.
pub fn observation_line(value: &str) -> String {
    format!("received message: {value}")
}

/// Consumer loop over a single subscription.
///
/// The subscription is owned by the loop's task and never shared, so at most
/// one poll is outstanding at any time.
pub struct ConsumerLoop<S> {
    subscriber: S,
    handler: Arc<dyn RecordHandler>,
    state: watch::Sender<LoopState>,
}

impl<S> ConsumerLoop<S>
where
    S: EventSubscriber + 'static,
{
    pub fn new(subscriber: S, handler: Arc<dyn RecordHandler>) -> Self {
        let (state, _) = watch::channel(LoopState::Starting);
        Self {
            subscriber,
            handler,
            state,
        }
    }

    /// Spawn the loop on its own task. It runs until `cancel` fires or a
    /// fatal broker error ends it.
    pub fn spawn(self, cancel: CancellationToken) -> ConsumerHandle {
        let state = self.state.subscribe();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { self.run(task_cancel).await });

        ConsumerHandle {
            cancel,
            state,
            task: Some(task),
        }
    }

    /// Drive the loop to completion on the current task.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), EventBusError> {
        let topic = self.subscriber.topic().to_string();
        let group_id = self.subscriber.group_id().to_string();

        self.set_state(LoopState::Running);
        info!(%topic, %group_id, "Consumer loop running");

        let outcome = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            match self.subscriber.poll(&cancel).await {
                Ok(PollOutcome::Record(record)) => self.handler.handle(&record),
                Ok(PollOutcome::Timeout) => debug!(%topic, "No record within poll timeout"),
                Ok(PollOutcome::Cancelled) => break Ok(()),
                Err(e) if e.is_fatal() => {
                    error!(%topic, error = %e, "Consumer loop stopping on fatal broker error");
                    break Err(e);
                }
                Err(e) => {
                    warn!(%topic, error = %e, "Error consuming message");
                    telemetry::record_consume_error(&topic);
                }
            }
        };

        self.set_state(LoopState::Stopping);
        if let Err(e) = self.subscriber.close().await {
            warn!(%topic, error = %e, "Failed to close subscription");
        }
        self.set_state(LoopState::Stopped);
        info!(%topic, %group_id, "Consumer loop stopped");

        outcome
    }

    fn set_state(&self, next: LoopState) {
        self.state.send_replace(next);
    }
}

/// Control handle for a spawned [`ConsumerLoop`].
pub struct ConsumerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<LoopState>,
    task: Option<JoinHandle<Result<(), EventBusError>>>,
}

impl ConsumerHandle {
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Receiver for observing state changes, e.g. from the readiness route.
    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    /// Wait until the loop reaches `target` or any later state.
    pub async fn wait_for(&mut self, target: LoopState) -> LoopState {
        let rank = |s: &LoopState| *s as u8;
        match self.state.wait_for(|s| rank(s) >= rank(&target)).await {
            Ok(state) => *state,
            // Sender dropped: the task is gone, which only happens once stopped.
            Err(_) => LoopState::Stopped,
        }
    }

    /// Cancel the loop, wait for it to release its subscription and return
    /// how it ended. Calling `stop` again is a no-op.
    pub async fn stop(&mut self) -> RelayResult<()> {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RelayError::EventBusError(e.to_string())),
            Err(e) => Err(RelayError::TaskError(format!("consumer task failed: {e}"))),
        }
    }
}

/// Test doubles shared by the loop and lifecycle tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use events_bus::{EventBusError, EventSubscriber, PollOutcome};
    use tokio_util::sync::CancellationToken;

    /// Replays a fixed sequence of poll results, then idles until cancelled.
    pub(crate) struct ScriptedSubscriber {
        script: VecDeque<events_bus::Result<PollOutcome>>,
        polls: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedSubscriber {
        pub(crate) fn new(script: Vec<events_bus::Result<PollOutcome>>) -> Self {
            Self {
                script: script.into(),
                polls: Arc::default(),
                closes: Arc::default(),
            }
        }

        pub(crate) fn polls(&self) -> Arc<AtomicUsize> {
            self.polls.clone()
        }

        pub(crate) fn closes(&self) -> Arc<AtomicUsize> {
            self.closes.clone()
        }
    }

    pub(crate) fn broker_lost() -> EventBusError {
        EventBusError::BrokerConnection {
            broker: "kafka:9092".to_string(),
            cause: "fatal client error".to_string(),
        }
    }

    #[async_trait]
    impl EventSubscriber for ScriptedSubscriber {
        fn topic(&self) -> &str {
            "greetings"
        }

        fn group_id(&self) -> &str {
            "serviceB-group"
        }

        async fn poll(&mut self, cancel: &CancellationToken) -> events_bus::Result<PollOutcome> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(next) => next,
                None => {
                    cancel.cancelled().await;
                    Ok(PollOutcome::Cancelled)
                }
            }
        }

        async fn close(&mut self) -> events_bus::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
