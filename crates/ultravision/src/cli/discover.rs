//! The `ultravision discover` command: scan localhost and the LAN for vision servers.

use clap::Args;
use ultravision_core::config::DiscoveryConfig;
use ultravision_core::{Config, DiscoveryMap, ServiceKind, VisionModelDiscovery};

/// Arguments for the `discover` command.
#[derive(Args, Debug, Default)]
pub struct DiscoverArgs {
    /// Timeout in seconds for each model listing request
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Only look for LM Studio servers
    #[arg(long, conflicts_with = "ollama_only")]
    pub lm_studio_only: bool,

    /// Only look for Ollama servers
    #[arg(long)]
    pub ollama_only: bool,

    /// LM Studio port to probe
    #[arg(long)]
    pub lm_studio_port: Option<u16>,

    /// Ollama port to probe
    #[arg(long)]
    pub ollama_port: Option<u16>,

    /// Maximum concurrent probes
    #[arg(long)]
    pub max_connections: Option<usize>,
}

impl DiscoverArgs {
    /// Restrict the scan to one family when requested.
    fn only(&self) -> Option<ServiceKind> {
        if self.lm_studio_only {
            Some(ServiceKind::LmStudio)
        } else if self.ollama_only {
            Some(ServiceKind::Ollama)
        } else {
            None
        }
    }

    /// Discovery settings with flag overrides applied.
    fn apply(&self, mut discovery: DiscoveryConfig) -> DiscoveryConfig {
        if let Some(secs) = self.timeout {
            discovery.request_timeout_ms = (secs.max(0.0) * 1000.0).round() as u64;
        }
        if let Some(port) = self.lm_studio_port {
            discovery.lm_studio_port = port;
        }
        if let Some(port) = self.ollama_port {
            discovery.ollama_port = port;
        }
        if let Some(max) = self.max_connections {
            discovery.max_connections = max;
        }
        discovery
    }
}

/// Execute the discover command, printing the result map as pretty JSON.
pub async fn execute(args: DiscoverArgs, config: Config) -> anyhow::Result<()> {
    let settings = args.apply(config.discovery);
    let discovery = VisionModelDiscovery::new(&settings)?;

    let servers: DiscoveryMap = match args.only() {
        Some(kind) => {
            tracing::info!("Scanning for {kind} servers...");
            DiscoveryMap::from([(kind, discovery.discover_kind(kind).await)])
        }
        None => {
            tracing::info!("Scanning for LM Studio and Ollama servers...");
            discovery.discover().await
        }
    };

    let found: usize = servers.values().map(Vec::len).sum();
    if found == 0 {
        tracing::warn!("No servers with vision models found.");
    } else {
        tracing::info!("Found {found} server(s) with vision models");
    }

    println!("{}", serde_json::to_string_pretty(&servers)?);
    Ok(())
}
