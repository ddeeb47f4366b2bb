//! End-to-end greeting flow over loopback TCP, with the in-memory broker
//! standing in for Kafka.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use events_bus::{ConsumedRecord, InMemoryBroker};
use greeter_server::grpc::{GreeterClient, HelloRequest};
use greeter_server::{serve_consumer, serve_publisher, Listeners, CONSUMER_GROUP_ID, GREETINGS_TOPIC};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const BOUND: Duration = Duration::from_secs(5);

struct RunningRole {
    grpc_addr: SocketAddr,
    http_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<error_common::Result<()>>,
}

impl RunningRole {
    async fn stop(self) -> error_common::Result<()> {
        self.shutdown.cancel();
        tokio::time::timeout(BOUND, self.task).await.unwrap().unwrap()
    }
}

async fn loopback_listeners() -> (Listeners, SocketAddr, SocketAddr) {
    let grpc = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let grpc_addr = grpc.local_addr().unwrap();
    let http_addr = http.local_addr().unwrap();
    (Listeners { grpc, http }, grpc_addr, http_addr)
}

async fn start_publisher(broker: &InMemoryBroker) -> RunningRole {
    let (listeners, grpc_addr, http_addr) = loopback_listeners().await;
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(serve_publisher(
        Arc::new(broker.clone()),
        listeners,
        shutdown.clone(),
    ));
    RunningRole {
        grpc_addr,
        http_addr,
        shutdown,
        task,
    }
}

async fn start_consumer(broker: &InMemoryBroker, seen: Arc<Mutex<Vec<String>>>) -> RunningRole {
    let (listeners, grpc_addr, http_addr) = loopback_listeners().await;
    let subscriber = broker
        .subscribe(GREETINGS_TOPIC, CONSUMER_GROUP_ID)
        .unwrap()
        .with_poll_timeout(Duration::from_millis(20));
    let handler = Arc::new(move |record: &ConsumedRecord| {
        seen.lock().unwrap().push(record.value.clone());
    });

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(serve_consumer(subscriber, handler, listeners, shutdown.clone()));
    RunningRole {
        grpc_addr,
        http_addr,
        shutdown,
        task,
    }
}

async fn say_hello(addr: SocketAddr, name: &str) -> Result<String, tonic::Status> {
    let mut client = GreeterClient::connect(format!("http://{addr}")).await.unwrap();
    client
        .say_hello(HelloRequest {
            name: name.to_string(),
        })
        .await
        .map(|response| response.into_inner().message)
}

/// Minimal HTTP/1.1 GET returning the raw response text.
async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn wait_for_seen(seen: &Mutex<Vec<String>>, count: usize) -> Vec<String> {
    tokio::time::timeout(BOUND, async {
        loop {
            let values = seen.lock().unwrap().clone();
            if values.len() >= count {
                return values;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap()
}

async fn wait_until_ready(addr: SocketAddr) {
    tokio::time::timeout(BOUND, async {
        while !http_get(addr, "/ready").await.starts_with("HTTP/1.1 200") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn greeting_reaches_the_consumer() {
    let broker = InMemoryBroker::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let publisher = start_publisher(&broker).await;
    let consumer = start_consumer(&broker, seen.clone()).await;
    wait_until_ready(consumer.http_addr).await;

    let reply = say_hello(publisher.grpc_addr, "Bob").await.unwrap();
    assert_eq!(reply, "Hello Bob from Service A");

    let observed = wait_for_seen(&seen, 1).await;
    assert_eq!(observed.len(), 1);
    assert!(observed[0].starts_with("Hello Bob from Service A at "));

    publisher.stop().await.unwrap();
    consumer.stop().await.unwrap();
    assert_eq!(broker.publisher_closes(), 1);
    assert_eq!(broker.subscriber_closes(), 1);
}

#[tokio::test]
async fn greetings_sent_before_the_consumer_starts_are_delivered() {
    let broker = InMemoryBroker::new();
    let publisher = start_publisher(&broker).await;

    for name in ["Alice", "Bob", "Carol"] {
        say_hello(publisher.grpc_addr, name).await.unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let consumer = start_consumer(&broker, seen.clone()).await;

    let observed = wait_for_seen(&seen, 3).await;
    assert!(observed[0].starts_with("Hello Alice from Service A at "));
    assert!(observed[1].starts_with("Hello Bob from Service A at "));
    assert!(observed[2].starts_with("Hello Carol from Service A at "));

    publisher.stop().await.unwrap();
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_publish_one_event_each() {
    let broker = InMemoryBroker::new();
    let publisher = start_publisher(&broker).await;
    let addr = publisher.grpc_addr;

    let calls: Vec<_> = (0..8)
        .map(|i| tokio::spawn(async move { say_hello(addr, &format!("caller-{i}")).await }))
        .collect();
    for (i, call) in calls.into_iter().enumerate() {
        let reply = call.await.unwrap().unwrap();
        assert_eq!(reply, format!("Hello caller-{i} from Service A"));
    }

    assert_eq!(broker.records(GREETINGS_TOPIC).len(), 8);
    publisher.stop().await.unwrap();
}

#[tokio::test]
async fn unacknowledged_publish_fails_the_call() {
    let broker = InMemoryBroker::new();
    broker.reject_publishes(true);
    let publisher = start_publisher(&broker).await;

    let status = say_hello(publisher.grpc_addr, "Bob").await.unwrap_err();

    assert_eq!(status.code(), tonic::Code::Unavailable);
    assert!(broker.records(GREETINGS_TOPIC).is_empty());
    publisher.stop().await.unwrap();
}

#[tokio::test]
async fn consumer_echoes_without_publishing() {
    let broker = InMemoryBroker::new();
    let consumer = start_consumer(&broker, Arc::new(Mutex::new(Vec::new()))).await;

    let reply = say_hello(consumer.grpc_addr, "Bob").await.unwrap();

    assert_eq!(reply, "Hello Bob from Service B");
    assert!(broker.records(GREETINGS_TOPIC).is_empty());
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn health_surfaces_name_each_role() {
    let broker = InMemoryBroker::new();
    let publisher = start_publisher(&broker).await;
    let consumer = start_consumer(&broker, Arc::new(Mutex::new(Vec::new()))).await;

    let response = http_get(publisher.http_addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("gRPC Service A is running."));

    let response = http_get(consumer.http_addr, "/").await;
    assert!(response.ends_with("gRPC Service B is running."));

    let response = http_get(publisher.http_addr, "/ready").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    wait_until_ready(consumer.http_addr).await;

    publisher.stop().await.unwrap();
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_serving_and_releases_the_broker() {
    let broker = InMemoryBroker::new();
    let consumer = start_consumer(&broker, Arc::new(Mutex::new(Vec::new()))).await;
    let grpc_addr = consumer.grpc_addr;
    wait_until_ready(consumer.http_addr).await;

    consumer.stop().await.unwrap();

    assert_eq!(broker.subscriber_closes(), 1);
    assert!(GreeterClient::connect(format!("http://{grpc_addr}")).await.is_err());
}
