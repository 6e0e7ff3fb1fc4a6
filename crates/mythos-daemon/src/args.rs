//! Command-line arguments, layered as overrides on top of `MythosConfig`.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mythosd", about = "MythosMUD real-time core")]
pub struct Args {
    #[arg(
        long,
        value_name = "config",
        help = "Path to a YAML or JSON configuration file; command-line flags override it"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(long, value_name = "listen-address", help = "HTTP listen address for /ws, /sse, and health endpoints")]
    pub listen_address: Option<String>,

    #[arg(long, value_name = "broker-url", help = "Message broker endpoint")]
    pub broker_url: Option<String>,

    #[arg(long, help = "Widen the tracing filter to debug for mythos_* crates")]
    pub debug: bool,

    #[arg(long, help = "Use the relaxed local-development config preset as the base before overlays")]
    pub dev: bool,
}

impl Args {
    /// Loads `MythosConfig` from the optional config file plus environment,
    /// then applies any CLI overrides on top.
    pub fn resolve_config(&self) -> eyre::Result<mythos_common::MythosConfig> {
        let base = if self.dev {
            mythos_common::MythosConfig::development()
        } else {
            mythos_common::MythosConfig::load(self.config_file.as_deref())
                .map_err(|e| eyre::eyre!("failed to load configuration: {e}"))?
        };

        let mut config = base;
        if let Some(listen_address) = &self.listen_address {
            config.listen_address = listen_address.clone();
        }
        if let Some(broker_url) = &self.broker_url {
            config.broker_url = broker_url.clone();
        }
        Ok(config)
    }
}
