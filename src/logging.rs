//! Logging setup controlled by `ARBOR_*` environment variables.
//!
//! The engine itself only emits `tracing` events; this module wires up a
//! subscriber for applications that do not bring their own.
//!
//! # Environment Variables
//!
//! - `ARBOR_DEBUG=true` - Enable debug logging
//! - `ARBOR_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `ARBOR_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `ARBOR_DEBUG`.
///
/// Returns `true` if `ARBOR_DEBUG` is set to "true", "1", or "yes"
/// (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("ARBOR_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `ARBOR_LOG_LEVEL`.
///
/// Defaults to "debug" when `ARBOR_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("ARBOR_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `ARBOR_LOG_FORMAT`.
///
/// Defaults to "json" for structured logging.
pub fn get_log_format() -> &'static str {
    env::var("ARBOR_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize the logging system.
///
/// Call once at application startup; subsequent calls are no-ops. Does
/// nothing unless `ARBOR_DEBUG` or `ARBOR_LOG_LEVEL` is set, and installs a
/// subscriber only when the `tracing-subscriber` feature is enabled.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("ARBOR_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!("arbor_query={}", level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            match get_log_format() {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "compact" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }

            tracing::info!(level = level, format = get_log_format(), "logging initialized");
        }
    });
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// Modifies environment variables, which is unsafe in multi-threaded
/// programs. Call this early, before spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: documented contract that callers invoke this at startup before
    // any threads exist.
    unsafe {
        env::set_var("ARBOR_LOG_LEVEL", level);
    }
    init();
}

/// Initialize logging for debugging.
///
/// Equivalent to setting `ARBOR_DEBUG=true` and calling [`init`].
///
/// # Safety
///
/// Modifies environment variables, which is unsafe in multi-threaded
/// programs. Call this early, before spawning threads.
pub fn init_debug() {
    // SAFETY: documented contract that callers invoke this at startup before
    // any threads exist.
    unsafe {
        env::set_var("ARBOR_DEBUG", "true");
    }
    init();
}
