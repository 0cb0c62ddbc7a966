use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `versync=trace`.
pub const LOG_ENV: &str = "VERSYNC_LOG";

/// Installs the stderr diagnostics subscriber.
///
/// `--verbose` lowers the default level to `debug`; `VERSYNC_LOG` wins when set.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
