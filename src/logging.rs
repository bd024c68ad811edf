//! Log subscriber set-up shared by the binaries

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
/// `verbose` raises this crate to `debug`, which logs prompts and SQL.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info,sql_chat=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second init (e.g. in tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
        .try_init();
}
