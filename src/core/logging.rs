use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the crate logs at `info`, or `debug`
/// when `verbose` is set. Calling this twice is harmless.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "kita=debug" } else { "kita=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
