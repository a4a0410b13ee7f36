pub mod actions;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod populate;
pub mod refresh;
pub mod result;
pub mod schema;
pub mod server;
pub mod storage;
pub mod translations;

// Ports and adapters for outbound HTTP
pub mod app;
pub mod infra;
