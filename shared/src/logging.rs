use tracing_subscriber::EnvFilter;

/// `RUST_LOG` takes precedence; otherwise `info`, or `debug` when verbose.
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}
