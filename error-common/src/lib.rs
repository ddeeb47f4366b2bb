//! Common error handling for the greeter relay services
//!
//! Errors are split by where they stop:
//!
//! - **Startup**: configuration, broker connection and listener binding
//!   failures abort the process before it reports ready
//! - **Runtime**: a failed publish fails one RPC; a bad record is skipped by
//!   the consumer loop. Neither reaches this type unless it ends a role
//! - **Shutdown**: errors while draining are logged and reported as the
//!   process exit status

pub mod types;

pub use types::*;
