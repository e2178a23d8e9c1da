//! # Structured Logging Module
//!
//! Environment-aware structured logging for tracing join lifecycles through
//! nested callbacks and deferred finalization.

use crate::config::JoinConfig;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
///
/// Installs a console layer (JSON when `logging.json` is set) filtered by the
/// configured level. An already-installed global subscriber is left in place.
pub fn init_structured_logging(config: &JoinConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let log_level = config.log_level();

        let console = if config.logging.json {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %config.environment,
            level = %log_level,
            json = config.logging.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Log structured data for a join lifecycle operation
pub fn log_join_operation(
    operation: &str,
    join: &str,
    pending: usize,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        join = %join,
        pending = pending,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔗 JOIN_OPERATION"
    );
}

/// Log a contract violation with full context
pub fn log_contract_violation(join: &str, operation: &str, error: &str) {
    tracing::error!(
        join = %join,
        operation = %operation,
        error = %error,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ CONTRACT_VIOLATION"
    );
}
