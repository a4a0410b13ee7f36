use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "recipe_sync=info";

/// Console output plus a JSON log rotated daily under `logs/`.
///
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_logging() -> WorkerGuard {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "recipe_sync.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(default_directive()))
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

fn default_directive() -> Directive {
    DEFAULT_DIRECTIVE
        .parse()
        .unwrap_or_else(|_| tracing::Level::INFO.into())
}
