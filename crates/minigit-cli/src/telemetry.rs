//! Logging initialization, controlled by `MINIGIT_LOG`.
//!
//! Unset: warnings and above. Set to an `EnvFilter` directive string (e.g.
//! `minigit=debug` or `trace`) to get more detail. The core crate never
//! prints directly; everything it reports goes through `tracing`.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_env("MINIGIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
