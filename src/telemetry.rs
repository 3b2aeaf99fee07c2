use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (e.g. `"info,consumer_supervisor=debug"`). Calling this more than once is
/// harmless, later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .try_init();

    if installed.is_err() {
        // A global subscriber already exists, keep it
        tracing::debug!("Tracing subscriber already installed");
    }
}
