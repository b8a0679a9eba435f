//! OnionMesh Logging
//!
//! Subscriber setup shared by the binaries. `RUST_LOG` always wins over the
//! built-in defaults.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,onionmesh=debug";

/// Filter used when `RUST_LOG` is unset and `--verbose` is given
pub const VERBOSE_FILTER: &str = "debug,hyper=info,reqwest=info";

fn build_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Panics if one is already set.
pub fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(build_filter(verbose))
        .init();
}

/// Install the global subscriber unless one is already set (tests call
/// this from many places)
pub fn try_init_logging(verbose: bool) -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_test_writer())
        .with(build_filter(verbose))
        .try_init()
        .is_ok()
}
