pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod upstream;

pub use config::{AppConfig, LoggingConfig, ServerConfig, UpstreamConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, ServerBuilder, TestscriptServer, build_app};
pub use upstream::{UpstreamError, UpstreamValidator};
