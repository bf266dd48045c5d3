//! JSON service definitions.
//!
//! ```json
//! {
//!   "services": [
//!     {
//!       "name": "web",
//!       "virtual_ip": "10.0.0.100",
//!       "virtual_mac": "00:00:00:00:00:64",
//!       "backends": [
//!         { "ip": "10.0.0.2", "mac": "00:00:00:00:00:02", "switch": 1, "port": 2 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use nib_types::{Location, MacAddress, PortId, SwitchId};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::nib::{Backend, Service};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub switch: SwitchId,
    pub port: PortId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub virtual_ip: Ipv4Addr,
    pub virtual_mac: MacAddress,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl ServiceConfig {
    pub fn to_service(&self) -> Service {
        let backends = self
            .backends
            .iter()
            .map(|b| Backend::new(b.ip, b.mac, Location::new(b.switch, b.port)))
            .collect();
        Service::new(self.name.clone(), self.virtual_ip, self.virtual_mac, backends)
    }
}

impl LoadBalancerConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse {
                path: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Service names and virtual addresses must be unique, and every service
    /// needs at least one backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut vips = HashSet::new();
        for service in &self.services {
            if !names.insert(service.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate service name '{}'",
                    service.name
                )));
            }
            if !vips.insert(service.virtual_ip) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate virtual_ip {}",
                    service.virtual_ip
                )));
            }
            if service.backends.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' has no backends",
                    service.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const WEB: &str = r#"{
        "services": [{
            "name": "web",
            "virtual_ip": "10.0.0.100",
            "virtual_mac": "00:00:00:00:00:64",
            "backends": [
                { "ip": "10.0.0.2", "mac": "00:00:00:00:00:02", "switch": 1, "port": 2 },
                { "ip": "10.0.0.3", "mac": "00:00:00:00:00:03", "switch": 1, "port": 3 }
            ]
        }]
    }"#;

    #[test]
    fn test_parse_services() {
        let config = LoadBalancerConfig::from_json(WEB).unwrap();
        assert_eq!(config.services.len(), 1);

        let service = config.services[0].to_service();
        assert_eq!(service.name, "web");
        assert_eq!(service.virtual_ip, Ipv4Addr::new(10, 0, 0, 100));
        assert_eq!(service.backends().len(), 2);
        assert_eq!(service.backends()[1].location, Location::new(1u64, 3u32));
    }

    #[test]
    fn test_duplicate_vip_rejected() {
        let mut config = LoadBalancerConfig::from_json(WEB).unwrap();
        let mut twin = config.services[0].clone();
        twin.name = "web2".into();
        config.services.push(twin);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_service_without_backends_rejected() {
        let json = r#"{"services":[{"name":"x","virtual_ip":"10.0.0.1","virtual_mac":"00:00:00:00:00:01"}]}"#;
        assert!(matches!(
            LoadBalancerConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_json_reports_parse_error() {
        assert!(matches!(
            LoadBalancerConfig::from_json("{\"services\": [ }"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WEB.as_bytes()).unwrap();
        let config = LoadBalancerConfig::load(file.path()).unwrap();
        assert_eq!(config.services[0].backends.len(), 2);
    }
}
