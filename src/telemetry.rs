/*!
 * Structured Tracing
 * Subscriber setup for the filesystem's tracing output
 */

use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Environment variable selecting JSON output
pub const TRACE_JSON_ENV: &str = "RGWFS_TRACE_JSON";

/// Install the global subscriber
///
/// Filter comes from `RUST_LOG` (default `info`). Set `RGWFS_TRACE_JSON=1`
/// for JSON lines instead of compact human output.
///
/// # Panics
/// If a global subscriber is already installed; use `try_init_tracing` otherwise.
pub fn init_tracing() {
    if let Err(e) = try_init_tracing() {
        panic!("failed to install tracing subscriber: {}", e);
    }
}

/// Install the global subscriber unless one is already installed
pub fn try_init_tracing() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init()?;
        info!("Structured tracing initialized");
    }
    Ok(())
}
