//! Structured logging bootstrap, shared by every binary in the workspace.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `debug` widens the default filter
/// from `info` to `debug` for the `mythos_*` crates.
pub fn init_tracing(debug: bool) {
    let default_directive = if debug { "info,mythos=debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("unable to install global tracing subscriber");
}
