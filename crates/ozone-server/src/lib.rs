pub mod config;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LogFormat, LoggingConfig, OtelConfig, ServerConfig};
pub use middleware::{REQUEST_ID_HEADER, RequestId};
pub use observability::{init_tracing, shutdown_tracing};
pub use server::{OzoneServer, ServerBuilder, build_app, build_app_with_gateway, build_gateway};
