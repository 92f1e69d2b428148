//! Logging initialization.
//!
//! Etude logs through `tracing`. Nothing is printed until a subscriber is
//! installed, so call one of these once at startup, before
//! [`Router::build`](crate::Router::build):
//!
//! ```rust,no_run
//! etude_core::logging::init_logging();
//! ```
//!
//! The level comes from `RUST_LOG` when set:
//!
//! ```bash
//! # one line per request, plus route listing
//! RUST_LOG=etude_core=debug cargo run
//!
//! # production
//! RUST_LOG=warn cargo run
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Formatted logs to stdout, `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Like [`init_logging`] with a different fallback level (`"debug"`,
/// `"warn"`, ...). `RUST_LOG` still wins when set.
pub fn init_logging_with_level(level: &str) {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Multi-line output with thread ids and line numbers, for development.
pub fn init_logging_pretty() {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(true),
        )
        .init();
}

/// One JSON object per event, for log aggregation.
pub fn init_logging_json() {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Like [`init_logging_with_level`] but returns an error instead of
/// panicking when a subscriber is already installed. Handy in tests.
pub fn try_init_logging(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
}
