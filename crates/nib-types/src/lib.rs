//! Primitive types for the controller's network information base.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`SwitchId`]: opaque datapath identifier (dpid)
//! - [`PortId`]: switch port number
//! - [`Location`]: a (switch, port) attachment point

mod location;
mod mac;

pub use location::{Location, PortId, SwitchId};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid switch identifier: {0}")]
    InvalidSwitchId(String),

    #[error("invalid port identifier: {0}")]
    InvalidPortId(String),
}
