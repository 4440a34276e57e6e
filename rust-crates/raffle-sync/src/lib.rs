use tracing_subscriber::EnvFilter;

pub mod app;

pub mod config;

pub mod events;

pub mod ledger;

pub mod snapshot;

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

/// Installs the stdout subscriber, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
