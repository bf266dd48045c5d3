//! Configuration file support for nibd
//!
//! Loads and validates the daemon configuration from a TOML file.
//!
//! ```toml
//! [controller]
//! client_id = "nibd"
//! install_delay_ms = 2000
//!
//! [load_balancer]
//! services_file = "/etc/nibd/services.json"
//!
//! [[topology.switches]]
//! dpid = 1
//! ports = [1, 2, 3]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nib_policy::SwitchPorts;
use nib_types::{PortId, SwitchId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::load_balancer::LoadBalancerConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/nibd/nibd.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Controller connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Tag attached to packets punted to this application
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Delay before a deferred policy install, in milliseconds
    #[serde(default = "default_install_delay")]
    pub install_delay_ms: u64,
}

/// Load balancer settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerSection {
    /// JSON service definitions; no services when unset
    #[serde(default)]
    pub services_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub dpid: SwitchId,
    #[serde(default)]
    pub ports: Vec<PortId>,
}

/// Static topology served by the replay transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
}

/// Complete nibd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NibdConfig {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub load_balancer: LoadBalancerSection,

    #[serde(default)]
    pub topology: TopologyConfig,
}

fn default_client_id() -> String {
    "nibd".to_string()
}

fn default_install_delay() -> u64 {
    2000
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            install_delay_ms: default_install_delay(),
        }
    }
}

impl TopologyConfig {
    pub fn to_switch_ports(&self) -> SwitchPorts {
        self.switches
            .iter()
            .map(|s| (s.dpid, s.ports.clone()))
            .collect()
    }
}

impl NibdConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Service definitions named by `load_balancer.services_file`.
    pub fn load_services(&self) -> Result<LoadBalancerConfig, ConfigError> {
        match &self.load_balancer.services_file {
            Some(path) => LoadBalancerConfig::load(path),
            None => Ok(LoadBalancerConfig::default()),
        }
    }

    pub fn install_delay(&self) -> Duration {
        Duration::from_millis(self.controller.install_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.client_id.is_empty() {
            return Err(ConfigError::Invalid(
                "client_id must not be empty".to_string(),
            ));
        }

        if self.controller.install_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "install_delay_ms must be > 0".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for switch in &self.topology.switches {
            if !seen.insert(switch.dpid) {
                return Err(ConfigError::Invalid(format!(
                    "switch {} listed twice in topology",
                    switch.dpid
                )));
            }
        }

        Ok(())
    }
}
