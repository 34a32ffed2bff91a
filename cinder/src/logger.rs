//! Log output for the server binary.

use tracing::subscriber::set_global_default;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, registry};

/// Installs the global subscriber and routes `log` records from the library crates into it.
///
/// The filter is read from `RUST_LOG` and defaults to `info`.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = registry()
        .with(filter)
        .with(fmt::layer().with_target(true));
    set_global_default(subscriber)?;
    LogTracer::init()?;
    Ok(())
}
