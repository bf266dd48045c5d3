//! Event-handler capability shared by the learning switch and the load
//! balancer.

use nib_policy::{PacketOut, Policy};
use nib_types::{Location, PortId, SwitchId};

use crate::nib::Nib;
use crate::packet::EthernetFrame;

/// A packet punted to the controller, already parsed.
#[derive(Debug, Clone, Copy)]
pub struct PacketIn<'a> {
    pub switch: SwitchId,
    pub port: PortId,
    pub payload: &'a [u8],
    pub frame: &'a EthernetFrame,
}

impl PacketIn<'_> {
    /// Ingress attachment point.
    pub fn location(&self) -> Location {
        Location {
            switch: self.switch,
            port: self.port,
        }
    }
}

/// A component that reacts to controller events and contributes a
/// sub-policy.
///
/// Handlers hold no NIB state of their own; the application lends them the
/// NIB on every call. Every registered handler observes every event, in
/// registration order.
///
/// # Lifecycle
///
/// 1. `connected()` once the topology snapshot has been loaded into the NIB
/// 2. `packet_in()` for every parsed packet-in
/// 3. `policy()` whenever the compiler recomputes the policy document
pub trait Handler: Send {
    /// Returns the name of this handler (for logging).
    fn name(&self) -> &str;

    /// Derives this handler's rules from current NIB state.
    ///
    /// Must be a pure function of `nib`: equal state, equal policy.
    fn policy(&self, nib: &Nib) -> Policy;

    /// Called after the connect-time topology snapshot is in the NIB.
    fn connected(&mut self, _nib: &mut Nib) {
        // Default: no-op
    }

    /// Inspects a packet-in, possibly mutating the NIB, and returns the
    /// packet-outs to emit.
    fn packet_in(&mut self, nib: &mut Nib, packet: &PacketIn<'_>) -> Vec<PacketOut>;

    /// Counter summary lines for logging at shutdown.
    fn dump_stats(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nib_policy::{Action, Match, Rule};
    use nib_types::MacAddress;
    use pretty_assertions::assert_eq;

    struct CountingHandler {
        seen: usize,
    }

    impl Handler for CountingHandler {
        fn name(&self) -> &str {
            "counting"
        }

        fn policy(&self, nib: &Nib) -> Policy {
            nib.switches()
                .map(|sw| Rule::new(sw, 1, Match::any(), vec![Action::Output(PortId::new(1))]))
                .collect()
        }

        fn packet_in(&mut self, _nib: &mut Nib, _packet: &PacketIn<'_>) -> Vec<PacketOut> {
            self.seen += 1;
            vec![]
        }
    }

    #[test]
    fn test_handler_trait_object() {
        let mut nib = Nib::new();
        nib.set_ports(SwitchId::new(1), [PortId::new(1)]);

        let mut handler: Box<dyn Handler> = Box::new(CountingHandler { seen: 0 });
        handler.connected(&mut nib);
        assert_eq!(handler.name(), "counting");
        assert_eq!(handler.policy(&nib).len(), 1);

        let frame = EthernetFrame {
            destination: MacAddress::BROADCAST,
            source: MacAddress::new([0, 0, 0, 0, 0, 1]),
            ether_type: 0x0806,
            vlan: None,
            ipv4: None,
        };
        let packet = PacketIn {
            switch: SwitchId::new(1),
            port: PortId::new(1),
            payload: &[],
            frame: &frame,
        };
        assert_eq!(packet.location(), Location::new(1u64, 1u32));
        assert!(handler.packet_in(&mut nib, &packet).is_empty());
        assert!(handler.dump_stats().is_empty());
    }
}
