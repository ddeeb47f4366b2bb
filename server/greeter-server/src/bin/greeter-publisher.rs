use std::process::ExitCode;

use clap::Parser;
use events_bus::KafkaConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use error_common::{log_error, RelayError, Result};
use greeter_server::{cancel_on_signal, run_publisher_service, ServiceArgs};

/// Greeter Service A: publishes a greeting event for every SayHello call
#[derive(Parser, Debug)]
#[command(name = "greeter-publisher")]
#[command(about = "gRPC greeter that publishes greeting events to Kafka")]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; real deployments use the environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = telemetry::init_tracing(&cli.service.log_options()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    telemetry::describe_metrics();

    match run(&cli.service).await {
        Ok(()) => {
            info!("greeter-publisher stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_error("greeter-publisher", &e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &ServiceArgs) -> Result<()> {
    let kafka = KafkaConfig::from_env().map_err(|e| RelayError::ConfigError(e.to_string()))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %args.host,
        grpc_port = args.grpc_port,
        http_port = args.http_port,
        "Starting greeter-publisher"
    );

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());
    run_publisher_service(args, &kafka, shutdown).await
}
