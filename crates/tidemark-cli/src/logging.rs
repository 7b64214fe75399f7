use tracing_subscriber::EnvFilter;

/// Route `tracing` output to stderr, keeping stdout for command results.
///
/// `RUST_LOG` wins over `--log-level` when set.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
