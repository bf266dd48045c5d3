//! Minimal Ethernet/IPv4 header parsing for packet-in payloads.
//!
//! Only the fields the handlers look at are decoded. A frame whose Ethernet
//! or 802.1Q header is cut short is rejected as a whole, so a malformed
//! packet never reaches the NIB. The IPv4 summary is best effort: a short or
//! non-v4 L3 header leaves `ipv4` empty and the frame is still switched.

use std::net::Ipv4Addr;

use nib_policy::ETH_TYPE_IPV4;
use nib_types::MacAddress;
use thiserror::Error;

const ETH_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const ETH_TYPE_VLAN: u16 = 0x8100;
const IPV4_MIN_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("Truncated {layer} header: need {needed} bytes, got {got}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        got: usize,
    },
}

/// Decoded IPv4 header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

/// Decoded Ethernet frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetFrame {
    pub destination: MacAddress,
    pub source: MacAddress,
    /// EtherType after any single 802.1Q tag.
    pub ether_type: u16,
    pub vlan: Option<u16>,
    pub ipv4: Option<Ipv4Header>,
}

impl EthernetFrame {
    pub fn parse(payload: &[u8]) -> Result<Self, PacketError> {
        let truncated = || PacketError::Truncated {
            layer: "ethernet",
            needed: ETH_HEADER_LEN,
            got: payload.len(),
        };
        if payload.len() < ETH_HEADER_LEN {
            return Err(truncated());
        }

        let destination = MacAddress::from_slice(&payload[0..6]).ok_or_else(truncated)?;
        let source = MacAddress::from_slice(&payload[6..12]).ok_or_else(truncated)?;

        let mut ether_type = read_u16(payload, 12);
        let mut offset = ETH_HEADER_LEN;
        let mut vlan = None;

        if ether_type == ETH_TYPE_VLAN {
            let needed = ETH_HEADER_LEN + VLAN_TAG_LEN;
            if payload.len() < needed {
                return Err(PacketError::Truncated {
                    layer: "802.1q",
                    needed,
                    got: payload.len(),
                });
            }
            vlan = Some(read_u16(payload, 14) & 0x0fff);
            ether_type = read_u16(payload, 16);
            offset = needed;
        }

        let ipv4 = if ether_type == ETH_TYPE_IPV4 {
            parse_ipv4(&payload[offset..])
        } else {
            None
        };

        Ok(Self {
            destination,
            source,
            ether_type,
            vlan,
            ipv4,
        })
    }
}

fn parse_ipv4(bytes: &[u8]) -> Option<Ipv4Header> {
    if bytes.len() < IPV4_MIN_HEADER_LEN || bytes[0] >> 4 != 4 {
        return None;
    }
    Some(Ipv4Header {
        protocol: bytes[9],
        src: Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]),
        dst: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
    })
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}
