use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{transport::Server, Request, Response, Status};
use tracing::{debug, info, warn};

use error_common::{RelayError, Result as RelayResult};

use crate::greeting::echo_reply;
use crate::publisher::GreetingPublisher;

// Generated gRPC code, regenerated with `--features gen-proto`
pub mod greet {
    include!("proto/greet.rs");
}

pub use greet::{
    greeter_client::GreeterClient,
    greeter_server::{Greeter, GreeterServer},
    HelloReply, HelloRequest,
};

/// Service A: publishes one greeting event per call, then replies.
#[derive(Clone)]
pub struct PublishingGreeter {
    publisher: GreetingPublisher,
}

impl PublishingGreeter {
    pub fn new(publisher: GreetingPublisher) -> Self {
        Self { publisher }
    }
}

#[tonic::async_trait]
impl Greeter for PublishingGreeter {
    async fn say_hello(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        let name = request.into_inner().name;
        debug!("gRPC SayHello request received");

        match self.publisher.handle_greeting(&name).await {
            Ok(message) => Ok(Response::new(HelloReply { message })),
            Err(e) => {
                warn!(error = %e, "SayHello failed, greeting event was not published");
                Err(Status::unavailable(format!(
                    "failed to publish greeting event: {e}"
                )))
            }
        }
    }
}

/// Service B: replies without touching the broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGreeter;

#[tonic::async_trait]
impl Greeter for EchoGreeter {
    async fn say_hello(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        let name = request.into_inner().name;
        Ok(Response::new(HelloReply {
            message: echo_reply(&name),
        }))
    }
}

/// Serve `service` on an already bound listener until `shutdown` fires.
/// In-flight calls are allowed to finish before this returns.
pub async fn serve_grpc<G: Greeter>(
    service: G,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> RelayResult<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| RelayError::NetworkError(format!("gRPC listener address: {e}")))?;
    info!("Starting gRPC server on {}", addr);

    Server::builder()
        .add_service(GreeterServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            shutdown.cancelled().await;
        })
        .await
        .map_err(|e| RelayError::GrpcError(format!("gRPC server error: {e}")))?;

    info!("gRPC server on {} stopped", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use events_bus::InMemoryBroker;

    fn request(name: &str) -> Request<HelloRequest> {
        Request::new(HelloRequest {
            name: name.to_string(),
        })
    }

    fn publishing(broker: &InMemoryBroker) -> PublishingGreeter {
        PublishingGreeter::new(GreetingPublisher::new(Arc::new(broker.clone()), "greetings"))
    }

    #[tokio::test]
    async fn publishing_greeter_replies_after_publish() {
        let broker = InMemoryBroker::new();

        let reply = publishing(&broker).say_hello(request("Bob")).await.unwrap();

        assert_eq!(reply.into_inner().message, "Hello Bob from Service A");
        let records = broker.records("greetings");
        assert_eq!(records.len(), 1);
        assert!(records[0].starts_with("Hello Bob from Service A at "));
    }

    #[tokio::test]
    async fn publish_failure_maps_to_unavailable() {
        let broker = InMemoryBroker::new();
        broker.reject_publishes(true);

        let status = publishing(&broker)
            .say_hello(request("Bob"))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert!(status.message().contains("failed to publish greeting event"));
    }

    #[tokio::test]
    async fn echo_greeter_identifies_service_b() {
        let reply = EchoGreeter.say_hello(request("Bob")).await.unwrap();
        assert_eq!(reply.into_inner().message, "Hello Bob from Service B");

        let reply = EchoGreeter.say_hello(request("")).await.unwrap();
        assert_eq!(reply.into_inner().message, "Hello  from Service B");
    }
}
