//! Match TLVs: the fields a flow rule tests against a packet.
//!
//! Ordering of a `Vec<Match>` inside a RouteMod is preserved end to end —
//! vendor translators filter and re-order by type, they never treat the
//! list as a set.

use super::{read_mac, read_u16, read_u32};
use rf_types::{IpPrefix, MacAddress};

/// Wire type tags for match TLVs. Arbitrary but stable within this
/// implementation; what matters is that encode/decode agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MatchType {
    InPort = 0,
    EtherType = 1,
    Ethernet = 2,
    VlanId = 3,
    VlanTagged = 4,
    Ipv4 = 5,
    Ipv6 = 6,
    IpProto = 7,
    TpSrc = 8,
    TpDst = 9,
}

impl MatchType {
    fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => MatchType::InPort,
            1 => MatchType::EtherType,
            2 => MatchType::Ethernet,
            3 => MatchType::VlanId,
            4 => MatchType::VlanTagged,
            5 => MatchType::Ipv4,
            6 => MatchType::Ipv6,
            7 => MatchType::IpProto,
            8 => MatchType::TpSrc,
            9 => MatchType::TpDst,
            _ => return None,
        })
    }
}

/// A single match TLV, decoded into its typed payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Match {
    InPort(u32),
    EtherType(u16),
    Ethernet(MacAddress),
    /// VLAN id is a 12-bit field with an explicit presence bit — "match
    /// untagged" and "match VLAN 0" are distinct matches.
    VlanId { present: bool, id: u16 },
    VlanTagged(bool),
    Ipv4(IpPrefix),
    Ipv6(IpPrefix),
    IpProto(u8),
    TpSrc(u16),
    TpDst(u16),
    /// A type tag this implementation doesn't assign semantics to. Carried
    /// through unchanged so an unrecognized match never silently vanishes.
    Unknown { match_type: u8, payload: Vec<u8> },
}

impl Match {
    pub fn match_type(&self) -> u8 {
        match self {
            Match::InPort(_) => MatchType::InPort as u8,
            Match::EtherType(_) => MatchType::EtherType as u8,
            Match::Ethernet(_) => MatchType::Ethernet as u8,
            Match::VlanId { .. } => MatchType::VlanId as u8,
            Match::VlanTagged(_) => MatchType::VlanTagged as u8,
            Match::Ipv4(_) => MatchType::Ipv4 as u8,
            Match::Ipv6(_) => MatchType::Ipv6 as u8,
            Match::IpProto(_) => MatchType::IpProto as u8,
            Match::TpSrc(_) => MatchType::TpSrc as u8,
            Match::TpDst(_) => MatchType::TpDst as u8,
            Match::Unknown { match_type, .. } => *match_type,
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Match::InPort(v) => v.to_be_bytes().to_vec(),
            Match::EtherType(v) => v.to_be_bytes().to_vec(),
            Match::Ethernet(mac) => mac.as_bytes().to_vec(),
            Match::VlanId { present, id } => {
                let mut buf = Vec::with_capacity(3);
                buf.push(*present as u8);
                buf.extend_from_slice(&id.to_be_bytes());
                buf
            }
            Match::VlanTagged(b) => vec![*b as u8],
            Match::Ipv4(prefix) => encode_ip_prefix(prefix),
            Match::Ipv6(prefix) => encode_ip_prefix(prefix),
            Match::IpProto(v) => vec![*v],
            Match::TpSrc(v) => v.to_be_bytes().to_vec(),
            Match::TpDst(v) => v.to_be_bytes().to_vec(),
            Match::Unknown { payload, .. } => payload.clone(),
        }
    }

    pub fn decode(match_type: u8, payload: &[u8]) -> Self {
        match MatchType::from_u8(match_type) {
            Some(MatchType::InPort) => Match::InPort(read_u32(payload)),
            Some(MatchType::EtherType) => Match::EtherType(read_u16(payload)),
            Some(MatchType::Ethernet) => Match::Ethernet(read_mac(payload)),
            Some(MatchType::VlanId) => {
                let present = payload.first().copied().unwrap_or(0) != 0;
                let id = if payload.len() >= 3 {
                    read_u16(&payload[1..])
                } else {
                    0
                };
                Match::VlanId { present, id }
            }
            Some(MatchType::VlanTagged) => Match::VlanTagged(payload.first().copied().unwrap_or(0) != 0),
            Some(MatchType::Ipv4) | Some(MatchType::Ipv6) => decode_ip_prefix(payload)
                .map(|p| {
                    if p.is_ipv4() {
                        Match::Ipv4(p)
                    } else {
                        Match::Ipv6(p)
                    }
                })
                .unwrap_or(Match::Unknown {
                    match_type,
                    payload: payload.to_vec(),
                }),
            Some(MatchType::IpProto) => Match::IpProto(payload.first().copied().unwrap_or(0)),
            Some(MatchType::TpSrc) => Match::TpSrc(read_u16(payload)),
            Some(MatchType::TpDst) => Match::TpDst(read_u16(payload)),
            None => Match::Unknown {
                match_type,
                payload: payload.to_vec(),
            },
        }
    }

    pub fn as_in_port(&self) -> Option<u32> {
        match self {
            Match::InPort(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ethernet(&self) -> Option<&MacAddress> {
        match self {
            Match::Ethernet(mac) => Some(mac),
            _ => None,
        }
    }

    pub fn as_ether_type(&self) -> Option<u16> {
        match self {
            Match::EtherType(v) => Some(*v),
            _ => None,
        }
    }
}

fn encode_ip_prefix(prefix: &IpPrefix) -> Vec<u8> {
    let mut buf = Vec::new();
    match prefix.address() {
        rf_types::IpAddress::V4(addr) => buf.extend_from_slice(&addr.octets()),
        rf_types::IpAddress::V6(addr) => buf.extend_from_slice(&addr.octets()),
    }
    buf.push(prefix.prefix_len());
    buf
}

fn decode_ip_prefix(payload: &[u8]) -> Option<IpPrefix> {
    match payload.len() {
        5 => {
            let addr = rf_types::Ipv4Address::new(payload[0], payload[1], payload[2], payload[3]);
            IpPrefix::new(addr.into(), payload[4]).ok()
        }
        17 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&payload[..16]);
            let addr = rf_types::Ipv6Address::from(std::net::Ipv6Addr::from(octets));
            IpPrefix::new(addr.into(), payload[16]).ok()
        }
        _ => None,
    }
}
