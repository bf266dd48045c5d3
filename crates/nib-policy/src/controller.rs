//! Controller transport contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use nib_types::{PortId, SwitchId};

use crate::{Action, Policy, TransportResult};

/// Topology snapshot: every connected switch with its active ports.
pub type SwitchPorts = BTreeMap<SwitchId, Vec<PortId>>;

/// Forwarding instruction for a single packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub switch: SwitchId,
    pub payload: Vec<u8>,
    pub actions: Vec<Action>,
}

impl PacketOut {
    pub fn new(switch: SwitchId, payload: impl Into<Vec<u8>>, actions: Vec<Action>) -> Self {
        Self {
            switch,
            payload: payload.into(),
            actions,
        }
    }
}

/// Transport between the controller application and the data plane.
///
/// The application calls into the transport from a single task, one event
/// at a time, so implementations only need `Send`.
///
/// # Example
///
/// ```ignore
/// struct Recorder { installs: Vec<Policy> }
///
/// #[async_trait]
/// impl Controller for Recorder {
///     async fn current_switches(&mut self) -> TransportResult<SwitchPorts> {
///         Ok(SwitchPorts::new())
///     }
///     fn pkt_out(&mut self, _out: PacketOut) -> TransportResult<()> { Ok(()) }
///     fn update(&mut self, policy: &Policy) -> TransportResult<()> {
///         self.installs.push(policy.clone());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Controller: Send {
    /// Queries the switches currently connected and their ports.
    async fn current_switches(&mut self) -> TransportResult<SwitchPorts>;

    /// Emits a packet-out. Fire-and-forget: a dropped packet is not resent.
    fn pkt_out(&mut self, out: PacketOut) -> TransportResult<()>;

    /// Installs a complete policy document, replacing the previous one.
    fn update(&mut self, policy: &Policy) -> TransportResult<()>;
}
