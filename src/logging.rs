//! # Structured Logging Module
//!
//! Environment-aware structured logging for shard loops and checkpoint flushes.

use std::sync::OnceLock;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer: Box<dyn Layer<Registry> + Send + Sync> = if use_json_format() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Embedding applications may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized; keeping it");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %log_level,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CONNECTOR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format() -> bool {
    std::env::var("CONNECTOR_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for shard loop operations
pub fn log_shard_operation(
    operation: &str,
    stream_name: &str,
    shard_id: &str,
    record_count: usize,
    first_seq: Option<&str>,
    last_seq: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        stream_name = %stream_name,
        shard_id = %shard_id,
        record_count = record_count,
        first_seq = first_seq,
        last_seq = last_seq,
        "📦 SHARD_OPERATION"
    );
}

/// Log structured data for checkpoint persistence
pub fn log_checkpoint_operation(
    operation: &str,
    store: &str,
    entries: usize,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        store = %store,
        entries = entries,
        status = %status,
        details = details,
        "💾 CHECKPOINT_OPERATION"
    );
}
