//! Tracing setup for processes embedding the mapping engine.
//!
//! The level filter sits behind a reload layer so that the configured
//! `logging.level` can be changed without reinstalling the subscriber.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Install the global subscriber with `level` as the initial filter.
///
/// `RUST_LOG`, when set and parseable, takes precedence. Installing twice is
/// a no-op for the subscriber; the first reload handle is kept.
pub fn init_tracing_with_level(level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

pub fn init_tracing_from(logging: &LoggingConfig) {
    init_tracing_with_level(&logging.level);
}

/// Swap the active filter for `level`.
///
/// Returns `false` when tracing was not installed through this module or the
/// level is not a valid filter directive.
pub fn apply_logging_level(level: &str) -> bool {
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    let filter = match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(e) => {
            tracing::warn!(level, error = %e, "rejected logging level");
            return false;
        }
    };
    match handle.reload(filter) {
        Ok(()) => {
            tracing::info!(level, "logging level changed");
            true
        }
        Err(e) => {
            tracing::warn!(level, error = %e, "logging level change failed");
            false
        }
    }
}
