use std::future::Future;
use std::sync::Arc;

use events_bus::{
    EventPublisher, EventSubscriber, KafkaConfig, KafkaPublisher, KafkaSubscriber, RecordHandler,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use error_common::{RelayError, Result as RelayResult};

use crate::config::{ServiceArgs, CONSUMER_GROUP_ID, GREETINGS_TOPIC};
use crate::consumer::{ConsumerLoop, LoggingHandler, LoopState};
use crate::grpc::{serve_grpc, EchoGreeter, PublishingGreeter};
use crate::health::{health_routes, serve_http, HealthState};
use crate::publisher::GreetingPublisher;

/// Listeners for the two network surfaces of a role
pub struct Listeners {
    pub grpc: TcpListener,
    pub http: TcpListener,
}

impl Listeners {
    pub async fn bind(args: &ServiceArgs) -> RelayResult<Self> {
        Ok(Self {
            grpc: bind_listener(&args.host, args.grpc_port).await?,
            http: bind_listener(&args.host, args.http_port).await?,
        })
    }
}

async fn bind_listener(host: &str, port: u16) -> RelayResult<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|e| RelayError::NetworkError(format!("Failed to bind to {host}:{port}: {e}")))
}

/// Run Service A until `shutdown` fires.
///
/// The broker connection is established before any listener is bound, so an
/// unreachable broker fails startup without opening ports.
pub async fn run_publisher_service(
    args: &ServiceArgs,
    kafka: &KafkaConfig,
    shutdown: CancellationToken,
) -> RelayResult<()> {
    let client = KafkaPublisher::connect(kafka)
        .await
        .map_err(|e| RelayError::EventBusError(e.to_string()))?;
    info!(brokers = %kafka.bootstrap_servers, "Kafka producer ready");

    let listeners = Listeners::bind(args).await?;
    serve_publisher(Arc::new(client), listeners, shutdown).await
}

/// Run Service B until `shutdown` fires.
pub async fn run_consumer_service(
    args: &ServiceArgs,
    kafka: &KafkaConfig,
    shutdown: CancellationToken,
) -> RelayResult<()> {
    let subscriber = KafkaSubscriber::subscribe(kafka, GREETINGS_TOPIC, CONSUMER_GROUP_ID)
        .await
        .map_err(|e| RelayError::EventBusError(e.to_string()))?;
    info!(
        brokers = %kafka.bootstrap_servers,
        topic = GREETINGS_TOPIC,
        group_id = CONSUMER_GROUP_ID,
        "Kafka consumer subscribed"
    );

    let listeners = Listeners::bind(args).await?;
    serve_consumer(subscriber, Arc::new(LoggingHandler), listeners, shutdown).await
}

/// Serve Service A's surfaces over an injected publisher.
///
/// The publisher is flushed and closed after both servers have drained.
pub async fn serve_publisher(
    client: Arc<dyn EventPublisher>,
    listeners: Listeners,
    shutdown: CancellationToken,
) -> RelayResult<()> {
    let greeter = PublishingGreeter::new(GreetingPublisher::new(client.clone(), GREETINGS_TOPIC));
    let router = health_routes(HealthState::publisher());

    let served = serve_until_shutdown(
        serve_grpc(greeter, listeners.grpc, shutdown.clone()),
        serve_http(router, listeners.http, shutdown.clone()),
        &shutdown,
    )
    .await;

    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to close publisher");
    }
    served
}

/// Serve Service B's surfaces and run its consumer loop.
///
/// The loop is stopped and its subscription closed after both servers have
/// drained. A loop that already ended on a fatal broker error reports it here.
pub async fn serve_consumer<S>(
    subscriber: S,
    handler: Arc<dyn RecordHandler>,
    listeners: Listeners,
    shutdown: CancellationToken,
) -> RelayResult<()>
where
    S: EventSubscriber + 'static,
{
    let mut consumer = ConsumerLoop::new(subscriber, handler).spawn(shutdown.child_token());
    let router = health_routes(HealthState::consumer(consumer.watch_state()));
    let escalation = shutdown_when_stopped(consumer.watch_state(), shutdown.clone());

    let served = serve_until_shutdown(
        serve_grpc(EchoGreeter, listeners.grpc, shutdown.clone()),
        serve_http(router, listeners.http, shutdown.clone()),
        &shutdown,
    )
    .await;

    let stopped = consumer.stop().await;
    if let Err(e) = &stopped {
        error!(error = %e, "Consumer loop ended with an error");
    }
    if let Err(e) = escalation.await {
        warn!(error = %e, "Consumer watch task failed");
    }

    served.and(stopped)
}

/// Cancel `shutdown` once the consumer loop stops. A loop can only stop on
/// its own after a fatal broker error; the process must not outlive it.
fn shutdown_when_stopped(
    mut state: watch::Receiver<LoopState>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // A closed channel means the loop task is gone, which counts as stopped.
        if state.wait_for(|s| *s == LoopState::Stopped).await.is_err() {
            warn!("Consumer loop task exited without reporting a final state");
        }
        if !shutdown.is_cancelled() {
            error!("Consumer loop stopped unexpectedly, shutting down");
            shutdown.cancel();
        }
    })
}

/// Drive both servers to completion. If either one exits, the other is told
/// to drain as well.
async fn serve_until_shutdown<G, H>(grpc: G, http: H, shutdown: &CancellationToken) -> RelayResult<()>
where
    G: Future<Output = RelayResult<()>>,
    H: Future<Output = RelayResult<()>>,
{
    let (grpc_result, http_result) = tokio::join!(
        async {
            let result = grpc.await;
            shutdown.cancel();
            result
        },
        async {
            let result = http.await;
            shutdown.cancel();
            result
        },
    );
    grpc_result.and(http_result)
}

/// Completes on SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

/// Cancel `shutdown` once a termination signal arrives.
pub fn cancel_on_signal(shutdown: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });
}
