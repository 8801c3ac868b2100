use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

pub struct LogConfig {
    pub filter: String,
}

/// Process-wide subscriber whose filter can be swapped once settings are read.
///
/// Log lines go to stderr; stdout carries command output.
pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
}

impl Logger {
    pub fn new_bootstrap() -> Self {
        let filter = EnvFilter::try_from_env("VERSEGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();

        Self { reload_handle }
    }

    /// Apply the configured filter unless `VERSEGATE_LOG` overrides it.
    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        if std::env::var_os("VERSEGATE_LOG").is_some() {
            return Ok(());
        }
        let filter = EnvFilter::try_new(&config.filter).map_err(|e| anyhow!(e))?;
        self.reload_handle.reload(filter).map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
