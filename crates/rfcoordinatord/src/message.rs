//! Wire messages (C2): the framed, self-describing control messages carried
//! over the IPC fabric.
//!
//! Every message is addressed by a decimal-string peer id and travels in a
//! four-frame packet `[recipient, channel, type, body]` (§6). The body is
//! encoded with `bincode` over a `serde`-derived enum — the "self-describing
//! binary document" the distilled spec leaves unspecified is resolved that
//! way here (see `SPEC_FULL.md` §10.3): a typed struct is the statically
//! typed equivalent of the original's decimal-string-scalar document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::{Action, Band, Match, RfOption};
use crate::error::CoordinatorError;
use rf_types::MacAddress;

/// A peer id. The wire form is always the decimal string of the integer
/// (§6); internally it's a plain `u64` so arithmetic/comparison don't pay a
/// string-parsing tax on every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(PeerId)
    }
}

/// The two named channels the core dispatches on (§4.3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Client,
    Proxy,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Client => "client",
            Channel::Proxy => "proxy",
        }
    }
}

impl FromStr for Channel {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Channel::Client),
            "proxy" => Ok(Channel::Proxy),
            _ => Err(CoordinatorError::UnknownRouteModOperation(0)),
        }
    }
}

/// `PortConfig` operation ids (coordinator-to-client control).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortConfigOp {
    Reset,
    MapSuccess,
    RouteModAck,
}

/// `RouteMod` operation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteModOp {
    Add,
    Delete,
    AddGroup,
    DeleteGroup,
    AddMeter,
    DeleteMeter,
    Controller,
}

/// A routing directive, carried in either direction (§3 "RouteMod").
///
/// `id` names the destination: a `vm_id` when the message still comes from
/// a client, rewritten to a `dp_id` by the translator before it is enqueued
/// for the proxy (§8 invariant: every outbound RouteMod carries an integer
/// `dp_id`, never a `vm_id`). The four TLV vectors are plain owned `Vec`s,
/// so `RouteMod::clone()` is already the deep copy §9 requires before any
/// remote (cross-datapath) re-use — there is no shared/aliased buffer to
/// accidentally mutate in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMod {
    pub operation: RouteModOp,
    pub id: u64,
    pub vm_port: u32,
    pub table_id: u8,
    pub group_id: u32,
    pub meter_id: u32,
    pub flags: u16,
    pub matches: Vec<Match>,
    pub actions: Vec<Action>,
    pub options: Vec<RfOption>,
    pub bands: Vec<Band>,
}

impl RouteMod {
    pub fn new(operation: RouteModOp, id: u64, vm_port: u32) -> Self {
        RouteMod {
            operation,
            id,
            vm_port,
            table_id: 0,
            group_id: 0,
            meter_id: 0,
            flags: 0,
            matches: Vec::new(),
            actions: Vec::new(),
            options: Vec::new(),
            bands: Vec::new(),
        }
    }

    pub fn ct_id(&self) -> Option<u32> {
        self.options.iter().find_map(RfOption::as_ct_id)
    }

    /// Stamps (or replaces) the `CT_ID` option. Called automatically before
    /// a RouteMod is enqueued for the proxy (§3, §8 invariant).
    pub fn with_ct_id(mut self, ct_id: u32) -> Self {
        self.options.retain(|o| o.as_ct_id().is_none());
        self.options.push(RfOption::CtId(ct_id));
        self
    }

    pub fn in_port(&self) -> Option<u32> {
        self.matches.iter().find_map(Match::as_in_port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    PortRegister {
        vm_id: u64,
        vm_port: u32,
        hwaddress: MacAddress,
    },
    DatapathPortRegister {
        ct_id: u32,
        dp_id: u64,
        dp_port: u32,
    },
    DatapathDown {
        ct_id: u32,
        dp_id: u64,
    },
    VirtualPlaneMap {
        vm_id: u64,
        vm_port: u32,
        vs_id: u64,
        vs_port: u32,
    },
    DataPlaneMap {
        ct_id: u32,
        dp_id: u64,
        dp_port: u32,
        vs_id: u64,
        vs_port: u32,
    },
    PortConfig {
        vm_id: u64,
        vm_port: u32,
        operation: PortConfigOp,
    },
    RouteMod(RouteMod),
}

impl Message {
    /// The one-byte type tag carried as its own wire frame (§6), kept
    /// distinct from the body's own discriminant for parity with the
    /// original four-frame framing.
    pub fn message_type(&self) -> u8 {
        match self {
            Message::PortRegister { .. } => 0,
            Message::DatapathPortRegister { .. } => 1,
            Message::DatapathDown { .. } => 2,
            Message::VirtualPlaneMap { .. } => 3,
            Message::DataPlaneMap { .. } => 4,
            Message::PortConfig { .. } => 5,
            Message::RouteMod(_) => 6,
        }
    }

    pub fn encode_body(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Message serialization is infallible for owned values")
    }

    pub fn decode_body(body: &[u8]) -> Result<Message, CoordinatorError> {
        bincode::deserialize(body).map_err(|_| CoordinatorError::UnknownRouteModOperation(0))
    }
}

/// The four-frame packet `[recipient, channel, type, body]` (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub recipient: PeerId,
    pub channel: Channel,
    pub message: Message,
}

impl Frame {
    pub fn new(recipient: PeerId, channel: Channel, message: Message) -> Self {
        Frame { recipient, channel, message }
    }

    pub fn to_wire(&self) -> (String, String, u8, Vec<u8>) {
        (
            self.recipient.to_string(),
            self.channel.as_str().to_string(),
            self.message.message_type(),
            self.message.encode_body(),
        )
    }

    pub fn from_wire(recipient: &str, channel: &str, body: &[u8]) -> Result<Frame, CoordinatorError> {
        let recipient = recipient
            .parse()
            .map_err(|_| CoordinatorError::UnknownRouteModOperation(0))?;
        let channel = channel.parse()?;
        let message = Message::decode_body(body)?;
        Ok(Frame { recipient, channel, message })
    }
}
