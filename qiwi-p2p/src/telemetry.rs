//! Tracing initialization for the `qiwi-p2p` binary.
//!
//! Installs a `tracing-subscriber` registry with console output. Verbosity is read from
//! `RUST_LOG` and defaults to `info`, e.g. `RUST_LOG=qiwi_p2p=debug` to see request and
//! response bodies. The library never installs a subscriber itself.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with an env filter and the fmt layer.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
