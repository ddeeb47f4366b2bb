use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use error_common::{RelayError, Result as RelayResult};

use crate::consumer::LoopState;

pub const PUBLISHER_BANNER: &str = "gRPC Service A is running.";
pub const CONSUMER_BANNER: &str = "gRPC Service B is running.";

/// What `/ready` reports on.
#[derive(Debug, Clone)]
pub enum Readiness {
    /// Ready as soon as the router is served: the publisher is constructed
    /// before any listener is bound.
    Always,
    /// Ready while the consumer loop is running.
    ConsumerLoop(watch::Receiver<LoopState>),
}

impl Readiness {
    fn check(&self) -> Result<(), String> {
        match self {
            Self::Always => Ok(()),
            Self::ConsumerLoop(state) => match *state.borrow() {
                LoopState::Running => Ok(()),
                other => Err(other.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthState {
    banner: &'static str,
    readiness: Readiness,
}

impl HealthState {
    pub fn publisher() -> Self {
        Self {
            banner: PUBLISHER_BANNER,
            readiness: Readiness::Always,
        }
    }

    pub fn consumer(state: watch::Receiver<LoopState>) -> Self {
        Self {
            banner: CONSUMER_BANNER,
            readiness: Readiness::ConsumerLoop(state),
        }
    }
}

/// Liveness banner
pub async fn banner(State(state): State<HealthState>) -> &'static str {
    state.banner
}

/// Readiness check
pub async fn ready(State(state): State<HealthState>) -> (StatusCode, String) {
    match state.readiness.check() {
        Ok(()) => (StatusCode::OK, "ready".to_string()),
        Err(current) => (StatusCode::SERVICE_UNAVAILABLE, current),
    }
}

/// Create health routes
pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/ready", get(ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the health router on an already bound listener until `shutdown` fires.
pub async fn serve_http(
    router: Router,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> RelayResult<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| RelayError::NetworkError(format!("HTTP listener address: {e}")))?;
    info!("Starting HTTP server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .map_err(|e| RelayError::ServerError(format!("HTTP server error: {e}")))?;

    info!("HTTP server on {} stopped", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn banners_name_the_role() {
        let (status, body) = get_text(health_routes(HealthState::publisher()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "gRPC Service A is running.");

        let (_tx, rx) = watch::channel(LoopState::Running);
        let (status, body) = get_text(health_routes(HealthState::consumer(rx)), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "gRPC Service B is running.");
    }

    #[tokio::test]
    async fn publisher_is_always_ready() {
        let (status, body) = get_text(health_routes(HealthState::publisher()), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ready");
    }

    #[tokio::test]
    async fn consumer_readiness_follows_loop_state() {
        let (tx, rx) = watch::channel(LoopState::Starting);
        let router = health_routes(HealthState::consumer(rx));

        let (status, body) = get_text(router.clone(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "starting");

        tx.send_replace(LoopState::Running);
        let (status, body) = get_text(router.clone(), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ready");

        tx.send_replace(LoopState::Stopped);
        let (status, body) = get_text(router, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "stopped");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (status, _) = get_text(health_routes(HealthState::publisher()), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
