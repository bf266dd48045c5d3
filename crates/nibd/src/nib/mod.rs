//! Network information base: topology, learned hosts and service state.
//!
//! The [`Nib`] is owned by the application and lent to handlers by
//! reference. All mutation goes through its methods so that the dirty flag
//! stays accurate: every change that can alter the compiled policy marks the
//! NIB dirty, and only the policy compiler clears it.
//!
//! | Mutation | Marks dirty |
//! |----------|-------------|
//! | `set_ports` / `set_all_ports` / `add_port` / `delete_port` | yes |
//! | `learn` / `unlearn` | no (learned hosts are not part of the policy) |
//! | `assign_backend` / `set_backend_health` | yes |

mod mac_table;
mod ports;
mod services;

pub use mac_table::MacTable;
pub use ports::PortRegistry;
pub use services::{Backend, Client, Connection, Service};

use std::net::Ipv4Addr;

use nib_policy::SwitchPorts;
use nib_types::{Location, MacAddress, PortId, SwitchId};
use thiserror::Error;
use tracing::debug;

/// Errors raised by NIB mutations that name an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NibError {
    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("Service '{service}' has no backend {backend}")]
    UnknownBackend { service: String, backend: Ipv4Addr },

    #[error("Duplicate virtual address {0}")]
    DuplicateVirtualIp(Ipv4Addr),
}

#[derive(Debug, Clone, Default)]
pub struct Nib {
    ports: PortRegistry,
    macs: MacTable,
    services: Vec<Service>,
    dirty: bool,
}

impl Nib {
    pub fn new() -> Self {
        Self::default()
    }

    // Dirty tracking

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    // Port registry

    pub fn set_ports(&mut self, switch: SwitchId, ports: impl IntoIterator<Item = PortId>) {
        self.ports.set_ports(switch, ports);
        self.topology_changed();
    }

    /// Loads a whole connect-time snapshot. Hosts learned on a port the
    /// snapshot no longer lists are forgotten and returned.
    pub fn set_all_ports(&mut self, switches: &SwitchPorts) -> Vec<MacAddress> {
        for (switch, ports) in switches {
            self.ports.set_ports(*switch, ports.iter().copied());
        }
        self.topology_changed();

        let stale: Vec<MacAddress> = self
            .macs
            .iter()
            .filter(|(_, location)| !self.ports.contains(*location))
            .map(|(mac, _)| mac)
            .collect();
        for mac in &stale {
            self.macs.unlearn(*mac);
        }
        stale
    }

    pub fn add_port(&mut self, switch: SwitchId, port: PortId) {
        self.ports.add_port(switch, port);
        self.topology_changed();
    }

    pub fn delete_port(&mut self, switch: SwitchId, port: PortId) {
        self.ports.delete_port(switch, port);
        self.topology_changed();
    }

    pub fn switches(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.ports.switches()
    }

    pub fn ports(&self, switch: SwitchId) -> impl Iterator<Item = PortId> + '_ {
        self.ports.ports(switch)
    }

    pub fn is_port_active(&self, location: Location) -> bool {
        self.ports.contains(location)
    }

    pub fn all_ports_except(
        &self,
        switch: SwitchId,
        port: PortId,
    ) -> impl Iterator<Item = PortId> + '_ {
        self.ports.all_ports_except(switch, port)
    }

    // MAC location table

    pub fn port_for_mac(&self, mac: MacAddress) -> Option<Location> {
        self.macs.port_for_mac(mac)
    }

    pub fn mac_for_port(&self, switch: SwitchId, port: PortId) -> Option<MacAddress> {
        self.macs.mac_for_port(Location { switch, port })
    }

    pub fn learn(&mut self, mac: MacAddress, location: Location) {
        if let Some(old) = self.macs.learn(mac, location) {
            debug!("{} moved from {} to {}", mac, old, location);
        }
    }

    pub fn unlearn(&mut self, mac: MacAddress) -> Option<Location> {
        self.macs.unlearn(mac)
    }

    /// Forgets every host learned behind (switch, port).
    pub fn unlearn_port(&mut self, switch: SwitchId, port: PortId) -> Vec<MacAddress> {
        self.macs.unlearn_location(Location { switch, port })
    }

    pub fn mac_table(&self) -> &MacTable {
        &self.macs
    }

    // Load-balancer services

    /// Registers a service. Its backends' reachability is derived from the
    /// current port registry.
    pub fn add_service(&mut self, mut service: Service) -> Result<(), NibError> {
        if self.service_by_vip(service.virtual_ip).is_some() {
            return Err(NibError::DuplicateVirtualIp(service.virtual_ip));
        }
        let ports = &self.ports;
        service.refresh_reachability(|loc| ports.contains(loc));
        self.services.push(service);
        self.dirty = true;
        Ok(())
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn service_by_vip(&self, virtual_ip: Ipv4Addr) -> Option<&Service> {
        self.services.iter().find(|s| s.virtual_ip == virtual_ip)
    }

    /// Pins `client` to the next live backend of the service at `virtual_ip`.
    ///
    /// Returns the chosen backend, or `None` when no service owns the address
    /// or its pool is entirely down.
    pub fn assign_backend(&mut self, virtual_ip: Ipv4Addr, client: Client) -> Option<&Backend> {
        let service = self
            .services
            .iter_mut()
            .find(|s| s.virtual_ip == virtual_ip)?;
        let index = service.assign(client)?;
        self.dirty = true;
        service.backend(index)
    }

    /// Applies a backend health event. Returns whether the flag changed.
    pub fn set_backend_health(
        &mut self,
        service: &str,
        backend: Ipv4Addr,
        healthy: bool,
    ) -> Result<bool, NibError> {
        let svc = self
            .services
            .iter_mut()
            .find(|s| s.name == service)
            .ok_or_else(|| NibError::UnknownService(service.to_string()))?;
        let changed = svc
            .set_health(backend, healthy)
            .ok_or_else(|| NibError::UnknownBackend {
                service: service.to_string(),
                backend,
            })?;
        if changed {
            self.dirty = true;
        }
        Ok(changed)
    }

    /// Re-derives backend reachability from the port registry.
    pub fn refresh_backend_reachability(&mut self) -> bool {
        let ports = &self.ports;
        let mut changed = false;
        for service in &mut self.services {
            changed |= service.refresh_reachability(|loc| ports.contains(loc));
        }
        if changed {
            self.dirty = true;
        }
        changed
    }

    fn topology_changed(&mut self) {
        self.refresh_backend_reachability();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sw(id: u64) -> SwitchId {
        SwitchId::new(id)
    }

    fn port(id: u32) -> PortId {
        PortId::new(id)
    }

    fn web_service() -> Service {
        Service::new(
            "web",
            Ipv4Addr::new(10, 0, 0, 100),
            MacAddress::new([0, 0, 0, 0, 0, 0x64]),
            vec![Backend::new(
                Ipv4Addr::new(10, 0, 0, 2),
                MacAddress::new([0, 0, 0, 0, 0, 2]),
                Location::new(1u64, 2u32),
            )],
        )
    }

    #[test]
    fn test_port_changes_mark_dirty() {
        let mut nib = Nib::new();
        assert!(!nib.is_dirty());

        nib.add_port(sw(1), port(1));
        assert!(nib.is_dirty());
        nib.clear_dirty();

        nib.delete_port(sw(1), port(1));
        assert!(nib.is_dirty());
        nib.clear_dirty();

        // Even a no-op removal is treated as a topology event
        nib.delete_port(sw(1), port(1));
        assert!(nib.is_dirty());
    }

    #[test]
    fn test_learning_does_not_mark_dirty() {
        let mut nib = Nib::new();
        let mac = MacAddress::new([0, 0, 0, 0, 0, 0xaa]);
        nib.learn(mac, Location::new(1u64, 1u32));
        assert!(!nib.is_dirty());
        assert_eq!(nib.mac_for_port(sw(1), port(1)), Some(mac));
        nib.unlearn(mac);
        assert!(!nib.is_dirty());
    }

    #[test]
    fn test_backend_reachability_follows_ports() {
        let mut nib = Nib::new();
        nib.add_service(web_service()).unwrap();
        assert!(!nib.services()[0].backends()[0].reachable);

        nib.set_all_ports(&SwitchPorts::from([(sw(1), vec![port(1), port(2)])]));
        assert!(nib.services()[0].backends()[0].is_live());

        nib.delete_port(sw(1), port(2));
        assert!(!nib.services()[0].backends()[0].is_live());
    }

    #[test]
    fn test_snapshot_forgets_hosts_on_vanished_ports() {
        let mut nib = Nib::new();
        nib.set_all_ports(&SwitchPorts::from([(sw(1), vec![port(1), port(2), port(3)])]));
        let kept = MacAddress::new([0, 0, 0, 0, 0, 0xaa]);
        let gone = MacAddress::new([0, 0, 0, 0, 0, 0xbb]);
        nib.learn(kept, Location::new(1u64, 1u32));
        nib.learn(gone, Location::new(1u64, 3u32));

        let stale = nib.set_all_ports(&SwitchPorts::from([(sw(1), vec![port(1), port(2)])]));
        assert_eq!(stale, vec![gone]);
        assert_eq!(nib.port_for_mac(gone), None);
        assert_eq!(nib.mac_for_port(sw(1), port(3)), None);
        assert_eq!(nib.port_for_mac(kept), Some(Location::new(1u64, 1u32)));

        // Nothing left to forget on an identical snapshot
        assert!(nib
            .set_all_ports(&SwitchPorts::from([(sw(1), vec![port(1), port(2)])]))
            .is_empty());
    }

    #[test]
    fn test_backend_health_errors_and_dirty() {
        let mut nib = Nib::new();
        nib.add_service(web_service()).unwrap();
        nib.clear_dirty();

        assert_eq!(
            nib.set_backend_health("nope", Ipv4Addr::new(10, 0, 0, 2), false),
            Err(NibError::UnknownService("nope".into()))
        );
        assert!(matches!(
            nib.set_backend_health("web", Ipv4Addr::new(10, 0, 0, 9), false),
            Err(NibError::UnknownBackend { .. })
        ));
        assert!(!nib.is_dirty());

        assert_eq!(
            nib.set_backend_health("web", Ipv4Addr::new(10, 0, 0, 2), true),
            Ok(false)
        );
        assert!(!nib.is_dirty());

        assert_eq!(
            nib.set_backend_health("web", Ipv4Addr::new(10, 0, 0, 2), false),
            Ok(true)
        );
        assert!(nib.is_dirty());
    }

    #[test]
    fn test_duplicate_virtual_ip_rejected() {
        let mut nib = Nib::new();
        nib.add_service(web_service()).unwrap();
        assert_eq!(
            nib.add_service(web_service()).unwrap_err(),
            NibError::DuplicateVirtualIp(Ipv4Addr::new(10, 0, 0, 100))
        );
    }

    #[test]
    fn test_assign_backend_marks_dirty() {
        let mut nib = Nib::new();
        nib.set_ports(sw(1), [port(1), port(2)]);
        nib.add_service(web_service()).unwrap();
        nib.clear_dirty();

        let client = Client {
            ip: Ipv4Addr::new(10, 0, 1, 1),
            mac: MacAddress::new([0, 0, 0, 0, 1, 1]),
            location: Location::new(1u64, 1u32),
        };
        assert!(nib.assign_backend(Ipv4Addr::new(10, 0, 0, 99), client).is_none());
        assert!(!nib.is_dirty());

        let backend = nib.assign_backend(Ipv4Addr::new(10, 0, 0, 100), client);
        assert_eq!(backend.map(|b| b.ip), Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(nib.is_dirty());
    }
}
