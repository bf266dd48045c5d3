//! Load-balanced service endpoints and their backend pools.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use nib_types::{Location, MacAddress};

/// A real server behind a virtual address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub location: Location,
    /// Result of the last health event. Backends start healthy.
    pub healthy: bool,
    /// Whether `location` is an active port.
    pub reachable: bool,
}

impl Backend {
    pub fn new(ip: Ipv4Addr, mac: MacAddress, location: Location) -> Self {
        Self {
            ip,
            mac,
            location,
            healthy: true,
            reachable: false,
        }
    }

    /// Eligible to receive traffic.
    pub fn is_live(&self) -> bool {
        self.healthy && self.reachable
    }
}

/// The client side of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Client {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    /// Where the client's first packet to the virtual address arrived.
    pub location: Location,
}

/// A client pinned to one backend (index into the service's pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub client: Client,
    pub backend: usize,
}

/// A virtual address fronting an ordered pool of backends.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub virtual_ip: Ipv4Addr,
    pub virtual_mac: MacAddress,
    backends: Vec<Backend>,
    connections: BTreeMap<Ipv4Addr, Connection>,
    cursor: usize,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        virtual_ip: Ipv4Addr,
        virtual_mac: MacAddress,
        backends: Vec<Backend>,
    ) -> Self {
        Self {
            name: name.into(),
            virtual_ip,
            virtual_mac,
            backends,
            connections: BTreeMap::new(),
            cursor: 0,
        }
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn backend(&self, index: usize) -> Option<&Backend> {
        self.backends.get(index)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection(&self, client_ip: Ipv4Addr) -> Option<&Connection> {
        self.connections.get(&client_ip)
    }

    /// The backend serving `client_ip`, if it is assigned and still live.
    pub fn live_backend_for(&self, client_ip: Ipv4Addr) -> Option<&Backend> {
        let conn = self.connections.get(&client_ip)?;
        self.backends.get(conn.backend).filter(|b| b.is_live())
    }

    /// Pins `client` to the next live backend in round-robin order.
    ///
    /// Returns the chosen backend's index, or `None` if the whole pool is down.
    pub(crate) fn assign(&mut self, client: Client) -> Option<usize> {
        let count = self.backends.len();
        let index = (0..count)
            .map(|offset| (self.cursor + offset) % count)
            .find(|&i| self.backends[i].is_live())?;

        self.cursor = (index + 1) % count;
        self.connections.insert(
            client.ip,
            Connection {
                client,
                backend: index,
            },
        );
        Some(index)
    }

    /// Sets a backend's health flag. Returns `None` for an unknown backend,
    /// otherwise whether the flag changed.
    pub(crate) fn set_health(&mut self, backend_ip: Ipv4Addr, healthy: bool) -> Option<bool> {
        let backend = self.backends.iter_mut().find(|b| b.ip == backend_ip)?;
        let changed = backend.healthy != healthy;
        backend.healthy = healthy;
        Some(changed)
    }

    /// Recomputes reachability from the active-port predicate.
    ///
    /// Returns true if any backend changed.
    pub(crate) fn refresh_reachability(&mut self, is_active: impl Fn(Location) -> bool) -> bool {
        let mut changed = false;
        for backend in &mut self.backends {
            let reachable = is_active(backend.location);
            changed |= backend.reachable != reachable;
            backend.reachable = reachable;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn backend(last: u8, port: u32) -> Backend {
        let mut b = Backend::new(
            Ipv4Addr::new(10, 0, 0, last),
            MacAddress::new([0, 0, 0, 0, 0, last]),
            Location::new(1u64, port),
        );
        b.reachable = true;
        b
    }

    fn client(last: u8) -> Client {
        Client {
            ip: Ipv4Addr::new(10, 0, 1, last),
            mac: MacAddress::new([0, 0, 0, 0, 1, last]),
            location: Location::new(1u64, 1u32),
        }
    }

    fn service() -> Service {
        Service::new(
            "web",
            Ipv4Addr::new(10, 0, 0, 100),
            MacAddress::new([0, 0, 0, 0, 0, 0x64]),
            vec![backend(2, 2), backend(3, 3)],
        )
    }

    #[test]
    fn test_round_robin_assignment() {
        let mut svc = service();
        assert_eq!(svc.assign(client(1)), Some(0));
        assert_eq!(svc.assign(client(2)), Some(1));
        assert_eq!(svc.assign(client(3)), Some(0));
        assert_eq!(svc.connections().count(), 3);
    }

    #[test]
    fn test_assignment_skips_dead_backends() {
        let mut svc = service();
        assert_eq!(svc.set_health(Ipv4Addr::new(10, 0, 0, 2), false), Some(true));
        assert_eq!(svc.assign(client(1)), Some(1));
        assert_eq!(svc.assign(client(2)), Some(1));

        assert_eq!(svc.set_health(Ipv4Addr::new(10, 0, 0, 3), false), Some(true));
        assert_eq!(svc.assign(client(3)), None);
    }

    #[test]
    fn test_set_health_unknown_backend() {
        let mut svc = service();
        assert_eq!(svc.set_health(Ipv4Addr::new(10, 9, 9, 9), false), None);
        assert_eq!(svc.set_health(Ipv4Addr::new(10, 0, 0, 2), true), Some(false));
    }

    #[test]
    fn test_live_backend_for_follows_liveness() {
        let mut svc = service();
        svc.assign(client(1));
        assert!(svc.live_backend_for(client(1).ip).is_some());

        svc.set_health(Ipv4Addr::new(10, 0, 0, 2), false);
        assert!(svc.live_backend_for(client(1).ip).is_none());
        assert!(svc.connection(client(1).ip).is_some());
    }

    #[test]
    fn test_refresh_reachability() {
        let mut svc = service();
        let changed = svc.refresh_reachability(|loc| loc.port.as_u32() == 2);
        assert!(changed);
        assert!(svc.backends()[0].is_live());
        assert!(!svc.backends()[1].is_live());
        assert!(!svc.refresh_reachability(|loc| loc.port.as_u32() == 2));
    }

    #[test]
    fn test_empty_pool_never_assigns() {
        let mut svc = Service::new(
            "empty",
            Ipv4Addr::new(10, 0, 0, 200),
            MacAddress::new([0, 0, 0, 0, 0, 0xc8]),
            vec![],
        );
        assert_eq!(svc.assign(client(1)), None);
    }
}
