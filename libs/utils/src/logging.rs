//! Structured logging setup shared by every binary.
//!
//! Initializes a `tracing-subscriber` with an `EnvFilter` driven by
//! `RUST_LOG`, defaulting to `info`. Call once near the top of `main`.

use tracing_subscriber::EnvFilter;

pub fn init(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
