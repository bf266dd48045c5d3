//! Switch, port and attachment-point identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque datapath identifier of a switch (dpid).
///
/// Parses from decimal or `0x`-prefixed hexadecimal.
///
/// ```
/// use nib_types::SwitchId;
///
/// let a: SwitchId = "0x1f".parse().unwrap();
/// let b: SwitchId = "31".parse().unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(u64);

impl SwitchId {
    pub const fn new(dpid: u64) -> Self {
        SwitchId(dpid)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SwitchId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(SwitchId)
            .map_err(|_| ParseError::InvalidSwitchId(s.to_string()))
    }
}

impl From<u64> for SwitchId {
    fn from(dpid: u64) -> Self {
        SwitchId(dpid)
    }
}

/// Physical port number on a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(u32);

impl PortId {
    pub const fn new(port: u32) -> Self {
        PortId(port)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(PortId)
            .map_err(|_| ParseError::InvalidPortId(s.to_string()))
    }
}

impl From<u32> for PortId {
    fn from(port: u32) -> Self {
        PortId(port)
    }
}

/// Where a host is attached: a port on a specific switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub switch: SwitchId,
    pub port: PortId,
}

impl Location {
    pub fn new(switch: impl Into<SwitchId>, port: impl Into<PortId>) -> Self {
        Self {
            switch: switch.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.switch, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_switch_id_parse() {
        assert_eq!("1".parse::<SwitchId>().unwrap(), SwitchId::new(1));
        assert_eq!("0xff".parse::<SwitchId>().unwrap(), SwitchId::new(255));
        assert!("0xzz".parse::<SwitchId>().is_err());
        assert!("-1".parse::<SwitchId>().is_err());
    }

    #[test]
    fn test_port_id_parse() {
        assert_eq!("3".parse::<PortId>().unwrap(), PortId::new(3));
        assert!("port3".parse::<PortId>().is_err());
    }

    #[test]
    fn test_location_display() {
        let loc = Location::new(1u64, 2u32);
        assert_eq!(loc.to_string(), "1:2");
    }

    #[test]
    fn test_location_serde() {
        let loc = Location::new(7u64, 4u32);
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, r#"{"switch":7,"port":4}"#);
    }
}
