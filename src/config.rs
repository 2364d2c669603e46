use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which rate-limit policy governs a managed virtual server.
///
/// The variant tags match the section names used by the policy document
/// (`bw` / `cps`), so the same strings appear in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum PolicyKind {
    /// Bandwidth rate limiting, realized as a `server` template.
    #[serde(rename = "bw")]
    Bandwidth,
    /// Connection-rate limiting, realized as a `virtual-server` template.
    #[serde(rename = "cps")]
    ConnectionRate,
}

impl PolicyKind {
    /// Human-readable name for log lines.
    pub fn label(self) -> &'static str {
        match self {
            PolicyKind::Bandwidth => "bandwidth",
            PolicyKind::ConnectionRate => "connection-rate",
        }
    }
}

/// A virtual server this agent reconciles, tagged with its policy kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagedVirtualServer {
    pub name: String,
    pub policy: PolicyKind,
}

/// Connection settings for the policy source (plain HTTP).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicySourceConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_policy_port")]
    pub port: u16,
}

/// Connection settings for the managed appliance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplianceConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_appliance_port")]
    pub port: u16,

    /// Empty credentials fall back to the appliance defaults at login.
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Identifier this appliance is listed under in the policy document.
    #[serde(default)]
    pub device_id: String,
}

impl ApplianceConfig {
    /// `host:port` as passed to the session client.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Agent configuration, constructed once at startup and immutable after
/// command-line overrides are applied.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub policy_source: PolicySourceConfig,

    pub appliance: ApplianceConfig,

    /// Virtual servers to reconcile each pass.
    #[serde(default)]
    pub virtual_servers: Vec<ManagedVirtualServer>,

    /// Seconds between reconciliation passes.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

fn default_policy_port() -> u16 {
    8181
}

fn default_appliance_port() -> u16 {
    443
}

fn default_check_interval() -> u64 {
    30
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub policy_host: Option<String>,
    pub policy_port: Option<u16>,
    pub appliance_host: Option<String>,
    pub appliance_port: Option<u16>,
    pub device_id: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Overwrite file-supplied fields with command-line values.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.policy_host {
            self.policy_source.host = host.clone();
        }
        if let Some(port) = overrides.policy_port {
            self.policy_source.port = port;
        }
        if let Some(host) = &overrides.appliance_host {
            self.appliance.host = host.clone();
        }
        if let Some(port) = overrides.appliance_port {
            self.appliance.port = port;
        }
        if let Some(id) = &overrides.device_id {
            self.appliance.device_id = id.clone();
        }
    }

    /// Validate required fields. Called after overrides are merged, before
    /// any remote connection is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.policy_source.host.is_empty() || self.policy_source.host == "0.0.0.0" {
            anyhow::bail!("Policy source host not set");
        }
        if self.policy_source.port == 0 {
            anyhow::bail!("Invalid policy source port: 0");
        }
        if self.appliance.host.is_empty() || self.appliance.host == "0.0.0.0" {
            anyhow::bail!("Appliance host not set");
        }
        if self.appliance.port == 0 {
            anyhow::bail!("Invalid appliance port: 0");
        }
        if self.appliance.device_id.is_empty() {
            anyhow::bail!("Appliance device id not set");
        }
        if self.check_interval == 0 {
            anyhow::bail!("Check interval must be at least 1 second");
        }
        for vs in &self.virtual_servers {
            if vs.name.is_empty() {
                anyhow::bail!("Virtual server entry with empty name");
            }
        }

        Ok(())
    }
}
