//! Tracing subscriber setup for binaries and tests that embed the library.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a caller default is given.
pub const DEFAULT_FILTER: &str = "pipeline_dna=info";

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes priority over `default_filter`. Returns false when a
/// global subscriber was already installed, so calling this more than once is
/// harmless.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = if default_filter.trim().is_empty() {
        DEFAULT_FILTER
    } else {
        default_filter
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .try_init()
        .is_ok()
}
