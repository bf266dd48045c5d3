//! Learning switch decision and statistics types.

use nib_policy::Action;
use nib_types::PortId;

/// How a packet-in was forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Destination known on the ingress switch.
    Unicast(PortId),
    /// Destination unknown: every active port except the ingress port.
    Flood(Vec<PortId>),
}

impl ForwardDecision {
    pub fn actions(&self) -> Vec<Action> {
        match self {
            ForwardDecision::Unicast(port) => vec![Action::Output(*port)],
            ForwardDecision::Flood(ports) => ports.iter().copied().map(Action::Output).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearningStats {
    pub macs_learned: u64,
    pub unicast: u64,
    pub flooded: u64,
}
