//! Tracing initialization for the VideoGen A2A binaries.
//!
//! # Usage
//!
//! ```no_run
//! use videogen_a2a_common::tracing::init_tracing;
//!
//! fn main() {
//!     init_tracing();
//!     tracing::info!("Application started");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls the log level and filtering. Examples:
//!   - `RUST_LOG=debug` - Enable debug logging for all modules
//!   - `RUST_LOG=videogen_a2a_host=debug` - Enable debug for specific crate
//!   - `RUST_LOG=warn,videogen_a2a_common=debug` - Warn by default, debug for common

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTarget {
    /// Standard output (the host CLI, whose transcript and logs interleave)
    #[default]
    Stdout,
    /// Standard error (the uploader, whose stdout is captured by the host)
    Stderr,
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn try_init_with(default_level: &str, target: LogTarget) -> Result<(), ()> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let registry = tracing_subscriber::registry().with(filter(default_level));

    match target {
        LogTarget::Stdout => registry.with(fmt_layer).try_init(),
        LogTarget::Stderr => registry
            .with(fmt_layer.with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|_| ())
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Filters via `RUST_LOG` (defaults to `info`) and writes to stdout.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with(LogTarget::Stdout, "info");
}

/// Initialize tracing with an explicit target and default level.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_tracing_with(target: LogTarget, default_level: &str) {
    if try_init_with(default_level, target).is_err() {
        panic!("global tracing subscriber already set");
    }
}

/// Try to initialize tracing, returning an error if already initialized.
///
/// ```
/// use videogen_a2a_common::tracing::try_init_tracing;
///
/// let _ = try_init_tracing();
/// ```
pub fn try_init_tracing() -> Result<(), ()> {
    try_init_with("info", LogTarget::Stdout)
}
