//! Per-switch registry of active ports.

use std::collections::{BTreeMap, BTreeSet};

use nib_types::{Location, PortId, SwitchId};

/// Active ports of every switch seen since the controller started.
///
/// Switch entries are created on first observation and never removed.
/// Iteration is in ascending switch and port order.
#[derive(Debug, Clone, Default)]
pub struct PortRegistry {
    switches: BTreeMap<SwitchId, BTreeSet<PortId>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the port set of `switch` with `ports`.
    pub fn set_ports(&mut self, switch: SwitchId, ports: impl IntoIterator<Item = PortId>) {
        self.switches.insert(switch, ports.into_iter().collect());
    }

    /// Adds a port. Returns true if it was not already active.
    pub fn add_port(&mut self, switch: SwitchId, port: PortId) -> bool {
        self.switches.entry(switch).or_default().insert(port)
    }

    /// Removes a port. Unknown switches and absent ports are a no-op.
    ///
    /// Returns true if the port was active.
    pub fn delete_port(&mut self, switch: SwitchId, port: PortId) -> bool {
        self.switches
            .get_mut(&switch)
            .is_some_and(|ports| ports.remove(&port))
    }

    pub fn contains(&self, location: Location) -> bool {
        self.switches
            .get(&location.switch)
            .is_some_and(|ports| ports.contains(&location.port))
    }

    pub fn switches(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.switches.keys().copied()
    }

    /// Active ports on `switch`; empty for an unknown switch.
    pub fn ports(&self, switch: SwitchId) -> impl Iterator<Item = PortId> + '_ {
        self.switches
            .get(&switch)
            .into_iter()
            .flat_map(|ports| ports.iter().copied())
    }

    /// Every active port on `switch` other than `port` (the flood set).
    pub fn all_ports_except(
        &self,
        switch: SwitchId,
        port: PortId,
    ) -> impl Iterator<Item = PortId> + '_ {
        self.ports(switch).filter(move |p| *p != port)
    }
}
