//! Forwarding policy model shared by the controller application and its
//! transport.
//!
//! - [`Policy`]: ordered set of per-switch match→action [`Rule`]s
//! - [`Match`] / [`Action`]: header pattern and the actions applied on a hit
//! - [`Controller`]: the transport contract (topology query, packet-out,
//!   policy install)
//! - [`PacketOut`]: a single forwarding instruction for one packet
//!
//! # Composition
//!
//! Each event handler contributes a sub-policy; the application unions them
//! in handler order:
//!
//! ```
//! use nib_policy::{Action, Match, Policy, Rule};
//! use nib_types::{PortId, SwitchId};
//!
//! let learning = Policy::from(vec![Rule::new(
//!     SwitchId::new(1),
//!     0,
//!     Match::any(),
//!     vec![Action::SendToController("learning".into())],
//! )]);
//! let balancer = Policy::from(vec![Rule::new(
//!     SwitchId::new(1),
//!     100,
//!     Match::any().in_port(PortId::new(2)),
//!     vec![Action::Output(PortId::new(3))],
//! )]);
//!
//! let policy = Policy::union([learning, balancer]);
//! assert_eq!(policy.len(), 2);
//! ```

mod controller;
mod error;
mod policy;

pub use controller::{Controller, PacketOut, SwitchPorts};
pub use error::{TransportError, TransportResult};
pub use policy::{Action, Match, Policy, Rule, ETH_TYPE_IPV4};
