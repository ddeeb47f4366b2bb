use clap::Args;

/// Topic carrying greeting events
pub const GREETINGS_TOPIC: &str = "greetings";

/// Consumer group used by Service B
pub const CONSUMER_GROUP_ID: &str = "serviceB-group";

/// Process options shared by both service binaries
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ServiceArgs {
    /// Bind address for the gRPC and HTTP listeners
    #[arg(long, env = "GREETER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// gRPC server port
    #[arg(long, env = "GREETER_GRPC_PORT", default_value_t = 50051)]
    pub grpc_port: u16,

    /// HTTP health server port
    #[arg(long, env = "GREETER_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON log lines
    #[arg(long, env = "GREETER_JSON_LOGS")]
    pub json_logs: bool,
}

impl ServiceArgs {
    pub fn log_options(&self) -> telemetry::LogOptions {
        telemetry::LogOptions {
            verbose: self.verbose,
            json: self.json_logs,
        }
    }
}
