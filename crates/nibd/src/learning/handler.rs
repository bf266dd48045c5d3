//! LearningHandler - MAC learning and unicast/flood forwarding.

use nib_policy::{Action, Match, PacketOut, Policy, Rule};
use tracing::{debug, instrument};

use super::types::{ForwardDecision, LearningStats};
use crate::handler::{Handler, PacketIn};
use crate::nib::Nib;

/// Priority of the catch-all punt rule; every other rule overrides it.
pub const PUNT_PRIORITY: u16 = 0;

pub struct LearningHandler {
    client_id: String,
    stats: LearningStats,
}

impl LearningHandler {
    /// `client_id` tags packets punted to this application.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            stats: LearningStats::default(),
        }
    }

    pub fn stats(&self) -> &LearningStats {
        &self.stats
    }

    /// Learns the source if it is new, then picks the output ports.
    pub fn decide(&mut self, nib: &mut Nib, packet: &PacketIn<'_>) -> ForwardDecision {
        let src = packet.frame.source;
        let dst = packet.frame.destination;

        if nib.port_for_mac(src).is_none() {
            nib.learn(src, packet.location());
            self.stats.macs_learned += 1;
            debug!("Learned {} at {}", src, packet.location());
        }

        match nib.port_for_mac(dst) {
            Some(location) if location.switch == packet.switch => {
                self.stats.unicast += 1;
                ForwardDecision::Unicast(location.port)
            }
            _ => {
                self.stats.flooded += 1;
                ForwardDecision::Flood(nib.all_ports_except(packet.switch, packet.port).collect())
            }
        }
    }
}

impl Handler for LearningHandler {
    fn name(&self) -> &str {
        "learning"
    }

    /// One punt-everything rule per known switch.
    fn policy(&self, nib: &Nib) -> Policy {
        nib.switches()
            .map(|switch| {
                Rule::new(
                    switch,
                    PUNT_PRIORITY,
                    Match::any(),
                    vec![Action::SendToController(self.client_id.clone())],
                )
            })
            .collect()
    }

    #[instrument(skip_all, fields(switch = %packet.switch, port = %packet.port))]
    fn packet_in(&mut self, nib: &mut Nib, packet: &PacketIn<'_>) -> Vec<PacketOut> {
        let decision = self.decide(nib, packet);
        debug!(
            "{} -> {}: {:?}",
            packet.frame.source, packet.frame.destination, decision
        );
        vec![PacketOut::new(
            packet.switch,
            packet.payload,
            decision.actions(),
        )]
    }

    fn dump_stats(&self) -> Vec<String> {
        vec![
            format!("macs_learned={}", self.stats.macs_learned),
            format!("unicast={}", self.stats.unicast),
            format!("flooded={}", self.stats.flooded),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{build, EthernetFrame};
    use nib_types::{Location, MacAddress, PortId, SwitchId};
    use pretty_assertions::assert_eq;

    const SW: SwitchId = SwitchId::new(1);

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0, 0, 0, 0, 0, last])
    }

    fn outputs(ports: &[u32]) -> Vec<Action> {
        ports
            .iter()
            .map(|p| Action::Output(PortId::new(*p)))
            .collect()
    }

    fn nib_with_ports(ports: &[u32]) -> Nib {
        let mut nib = Nib::new();
        nib.set_ports(SW, ports.iter().copied().map(PortId::new));
        nib.clear_dirty();
        nib
    }

    fn send(
        handler: &mut LearningHandler,
        nib: &mut Nib,
        port: u32,
        src: MacAddress,
        dst: MacAddress,
    ) -> Vec<PacketOut> {
        let payload = build::ethernet(dst, src, 0x0806);
        let frame = EthernetFrame::parse(&payload).unwrap();
        let packet = PacketIn {
            switch: SW,
            port: PortId::new(port),
            payload: &payload,
            frame: &frame,
        };
        handler.packet_in(nib, &packet)
    }

    #[test]
    fn test_flood_to_unknown_destination() {
        let mut nib = nib_with_ports(&[1, 2, 3]);
        let mut handler = LearningHandler::new("learning_app");

        let outs = send(&mut handler, &mut nib, 1, mac(0xaa), mac(0xbb));
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].switch, SW);
        assert_eq!(outs[0].actions, outputs(&[2, 3]));
        assert_eq!(nib.port_for_mac(mac(0xaa)), Some(Location::new(1u64, 1u32)));
    }

    #[test]
    fn test_short_ip_header_still_switched() {
        let mut nib = nib_with_ports(&[1, 2, 3]);
        let mut handler = LearningHandler::new("learning_app");

        let mut payload = build::ethernet(mac(0xbb), mac(0xaa), 0x0800);
        payload.extend_from_slice(&[0x45, 0, 0, 0]);
        let frame = EthernetFrame::parse(&payload).unwrap();
        let packet = PacketIn {
            switch: SW,
            port: PortId::new(1),
            payload: &payload,
            frame: &frame,
        };

        let outs = handler.packet_in(&mut nib, &packet);
        assert_eq!(outs[0].actions, outputs(&[2, 3]));
        assert_eq!(nib.port_for_mac(mac(0xaa)), Some(Location::new(1u64, 1u32)));
    }

    #[test]
    fn test_unicast_to_learned_destination() {
        let mut nib = nib_with_ports(&[1, 2, 3]);
        let mut handler = LearningHandler::new("learning_app");
        nib.learn(mac(0xbb), Location::new(1u64, 2u32));

        let outs = send(&mut handler, &mut nib, 1, mac(0xaa), mac(0xbb));
        assert_eq!(outs[0].actions, outputs(&[2]));
        assert_eq!(handler.stats().unicast, 1);
        assert_eq!(handler.stats().flooded, 0);
    }

    #[test]
    fn test_known_source_is_not_refreshed() {
        let mut nib = nib_with_ports(&[1, 2, 3]);
        let mut handler = LearningHandler::new("learning_app");

        send(&mut handler, &mut nib, 1, mac(0xaa), mac(0xbb));
        send(&mut handler, &mut nib, 3, mac(0xaa), mac(0xbb));

        assert_eq!(nib.port_for_mac(mac(0xaa)), Some(Location::new(1u64, 1u32)));
        assert_eq!(handler.stats().macs_learned, 1);
    }

    #[test]
    fn test_destination_on_other_switch_floods() {
        let mut nib = nib_with_ports(&[1, 2, 3]);
        let mut handler = LearningHandler::new("learning_app");
        nib.learn(mac(0xbb), Location::new(2u64, 1u32));

        let outs = send(&mut handler, &mut nib, 1, mac(0xaa), mac(0xbb));
        assert_eq!(outs[0].actions, outputs(&[2, 3]));
    }

    #[test]
    fn test_learning_does_not_dirty_policy() {
        let mut nib = nib_with_ports(&[1, 2]);
        let mut handler = LearningHandler::new("learning_app");
        send(&mut handler, &mut nib, 1, mac(0xaa), mac(0xbb));
        assert!(!nib.is_dirty());
    }

    #[test]
    fn test_policy_punts_on_every_switch() {
        let mut nib = nib_with_ports(&[1, 2]);
        nib.set_ports(SwitchId::new(2), [PortId::new(1)]);
        let handler = LearningHandler::new("learning_app");

        let policy = handler.policy(&nib);
        assert_eq!(policy.len(), 2);
        for rule in policy.rules() {
            assert_eq!(rule.priority, PUNT_PRIORITY);
            assert!(rule.pattern.is_wildcard());
            assert_eq!(
                rule.actions,
                vec![Action::SendToController("learning_app".into())]
            );
        }
    }
}
