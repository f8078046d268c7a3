//! LAN discovery of LM Studio and Ollama servers hosting vision models.
//!
//! Localhost is probed first, then every host of each directly attached
//! IPv4 subnet. Port probes and model queries run concurrently, each phase
//! bounded by `max_connections`. Any failure along the way means "not
//! found" and is only visible at debug level.

pub(crate) mod interfaces;
pub(crate) mod matcher;
pub(crate) mod probe;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::config::DiscoveryConfig;
use crate::error::ConfigError;

pub use interfaces::{local_ipv4_interfaces, LocalInterface};
pub use matcher::VisionModelMatcher;
pub use probe::{check_port, fetch_models};

/// Connect timeout for model listing requests.
const MODELS_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Inference server family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    LmStudio,
    Ollama,
}

impl ServiceKind {
    /// Preference order for automatic selection.
    pub const ALL: [ServiceKind; 2] = [ServiceKind::LmStudio, ServiceKind::Ollama];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::LmStudio => "lm_studio",
            ServiceKind::Ollama => "ollama",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::LmStudio => 1234,
            ServiceKind::Ollama => 11434,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reachable server with at least one vision model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredServer {
    #[serde(skip)]
    pub service_kind: ServiceKind,
    #[serde(rename = "server_address")]
    pub address: String,
    pub vision_models: Vec<String>,
    /// Other URLs reaching the same machine; set for localhost results only
    #[serde(rename = "local_addresses", skip_serializing_if = "Vec::is_empty")]
    pub local_aliases: Vec<String>,
}

/// Servers per family, localhost first.
pub type DiscoveryMap = BTreeMap<ServiceKind, Vec<DiscoveredServer>>;

/// Scanner for vision-capable inference servers.
pub struct VisionModelDiscovery {
    lm_studio_port: u16,
    ollama_port: u16,
    probe_timeout: Duration,
    max_connections: usize,
    max_subnet_hosts: usize,
    matcher: VisionModelMatcher,
    client: reqwest::Client,
}

impl VisionModelDiscovery {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, ConfigError> {
        let matcher = VisionModelMatcher::new(&config.vision_patterns, &config.vision_hints)?;
        let client = reqwest::Client::builder()
            .connect_timeout(MODELS_CONNECT_TIMEOUT)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                tracing::debug!("Falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });

        Ok(Self {
            lm_studio_port: config.lm_studio_port,
            ollama_port: config.ollama_port,
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            max_connections: config.max_connections.max(1),
            max_subnet_hosts: config.max_subnet_hosts,
            matcher,
            client,
        })
    }

    /// Configured port for a family; 0 means disabled.
    pub fn port(&self, kind: ServiceKind) -> u16 {
        match kind {
            ServiceKind::LmStudio => self.lm_studio_port,
            ServiceKind::Ollama => self.ollama_port,
        }
    }

    fn enabled(&self) -> Vec<(ServiceKind, u16)> {
        ServiceKind::ALL
            .iter()
            .map(|&kind| (kind, self.port(kind)))
            .filter(|&(_, port)| port != 0)
            .collect()
    }

    /// Scan localhost and the LAN for every enabled family.
    ///
    /// The map always holds an entry per family, possibly empty.
    pub async fn discover(&self) -> DiscoveryMap {
        self.discover_ports(&self.enabled()).await
    }

    /// Scan for a single family only.
    pub async fn discover_kind(&self, kind: ServiceKind) -> Vec<DiscoveredServer> {
        let ports: Vec<_> = self
            .enabled()
            .into_iter()
            .filter(|&(k, _)| k == kind)
            .collect();
        self.discover_ports(&ports)
            .await
            .remove(&kind)
            .unwrap_or_default()
    }

    async fn discover_ports(&self, ports: &[(ServiceKind, u16)]) -> DiscoveryMap {
        if ports.is_empty() {
            return aggregate(Vec::new(), Vec::new());
        }

        let interfaces = interfaces::local_ipv4_interfaces();

        tracing::info!("Probing localhost");
        let local = self.probe_localhost(ports, &interfaces).await;

        let hosts = interfaces::lan_hosts(&interfaces, self.max_subnet_hosts);
        tracing::info!("Probing {} LAN host(s)", hosts.len());
        let lan = self.probe_hosts(ports, &hosts).await;

        aggregate(local, lan)
    }

    /// Check `127.0.0.1` for each family, in preference order.
    pub async fn probe_localhost(
        &self,
        ports: &[(ServiceKind, u16)],
        interfaces: &[LocalInterface],
    ) -> Vec<DiscoveredServer> {
        let mut found = Vec::new();
        for &(kind, port) in ports {
            if !check_port(IpAddr::V4(Ipv4Addr::LOCALHOST), port, self.probe_timeout).await {
                continue;
            }
            let address = format!("http://127.0.0.1:{port}");
            let vision_models = self.vision_models(&address).await;
            if vision_models.is_empty() {
                tracing::debug!("{kind} on localhost has no vision models");
                continue;
            }
            found.push(DiscoveredServer {
                service_kind: kind,
                address,
                vision_models,
                local_aliases: interfaces::local_aliases(interfaces, port),
            });
        }
        found
    }

    /// Probe every host for every family, then query each open port.
    ///
    /// Results are ordered by family, then host address.
    pub async fn probe_hosts(
        &self,
        ports: &[(ServiceKind, u16)],
        hosts: &[Ipv4Addr],
    ) -> Vec<DiscoveredServer> {
        let timeout = self.probe_timeout;
        let targets: Vec<(ServiceKind, Ipv4Addr, u16)> = hosts
            .iter()
            .flat_map(|&host| ports.iter().map(move |&(kind, port)| (kind, host, port)))
            .collect();

        let mut open: Vec<(ServiceKind, Ipv4Addr, u16)> = stream::iter(targets)
            .map(|(kind, host, port)| async move {
                check_port(IpAddr::V4(host), port, timeout)
                    .await
                    .then_some((kind, host, port))
            })
            .buffer_unordered(self.max_connections)
            .filter_map(|hit| async move { hit })
            .collect()
            .await;
        open.sort();
        tracing::debug!("{} open port(s) on the LAN", open.len());

        stream::iter(open)
            .map(|(kind, host, port)| async move {
                let address = format!("http://{host}:{port}");
                let vision_models = self.vision_models(&address).await;
                (!vision_models.is_empty()).then(|| DiscoveredServer {
                    service_kind: kind,
                    address,
                    vision_models,
                    local_aliases: Vec::new(),
                })
            })
            .buffered(self.max_connections)
            .filter_map(|server| async move { server })
            .collect()
            .await
    }

    async fn vision_models(&self, base_url: &str) -> Vec<String> {
        self.matcher
            .filter(fetch_models(&self.client, base_url).await)
    }
}

/// Group servers by family, localhost results ahead of LAN results.
///
/// Every family gets a key, even when nothing was found for it.
pub fn aggregate(local: Vec<DiscoveredServer>, lan: Vec<DiscoveredServer>) -> DiscoveryMap {
    let mut results: DiscoveryMap = ServiceKind::ALL
        .iter()
        .map(|&kind| (kind, Vec::new()))
        .collect();
    for server in local.into_iter().chain(lan) {
        results
            .entry(server.service_kind)
            .or_default()
            .push(server);
    }
    results
}

/// First server and model in preference order: LM Studio, then Ollama.
pub fn first_target(servers: &DiscoveryMap) -> Option<(String, String)> {
    ServiceKind::ALL.iter().find_map(|kind| {
        let server = servers.get(kind)?.first()?;
        let model = server.vision_models.first()?;
        Some((server.address.clone(), model.clone()))
    })
}
