//! Logging setup and GC event helpers.
//!
//! The object memory emits structured `tracing` events. Nothing is printed
//! until a subscriber is installed, either by the embedder or through
//! [`init`], which reads:
//!
//! - `OBJECT_MEMORY_LOG_LEVEL` - trace, debug, info, warn or error
//! - `OBJECT_MEMORY_LOG_SPANS` - set to show span enter/close events
//!
//! `RUST_LOG` takes precedence over the level when present.

use once_cell::sync::OnceCell;
use std::io;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for the object memory crates.
    pub level: Level,
    /// Show span enter/close events.
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Reads the logging variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("OBJECT_MEMORY_LOG_LEVEL") {
            config.level = match level.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            };
        }
        config.show_spans = std::env::var("OBJECT_MEMORY_LOG_SPANS").is_ok();
        config
    }
}

/// Installs a console subscriber configured from the environment.
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Installs a console subscriber. Only the first call has an effect.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let level = config.level.as_str().to_lowercase();
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "object_memory={level},page_allocator={level},core_types={level}"
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        // Another subscriber may already be global (tests, embedders).
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_span_events(span_events)
                    .with_target(true)
                    .with_line_number(cfg!(debug_assertions)),
            )
            .try_init();
    });
}

/// Logs the start of a collection.
pub fn log_gc_start(kind: &'static str, used: usize) {
    debug!(event = "gc_start", kind = kind, used = used);
}

/// Logs the end of a collection.
pub fn log_gc_complete(kind: &'static str, used_before: usize, used_after: usize, duration: Duration) {
    info!(
        event = "gc_complete",
        kind = kind,
        used_before = used_before,
        used_after = used_after,
        freed = used_before.saturating_sub(used_after),
        duration_us = duration.as_micros() as u64,
    );
}

/// Logs a chunk handed to a space.
pub fn log_chunk_allocated(space: &'static str, start: core_types::Address, size: usize) {
    debug!(event = "chunk_allocated", space = space, start = %start, size = size);
}
