//! Action TLVs: what a flow rule does to a matching packet.
//!
//! Most actions (`ACTION_BIN` in the original vocabulary) carry a plain
//! 32-bit integer payload (a port number, a VLAN id, a group id, …);
//! set-Ethernet actions carry a 6-byte MAC; several actions are pure
//! control bits with an empty payload.

use super::{read_mac, read_u32};
use rf_types::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ActionType {
    Output = 0,
    SetEthSrc = 1,
    SetEthDst = 2,
    PushVlan = 3,
    PopVlan = 4,
    SetVlanId = 5,
    PushMpls = 6,
    PopMpls = 7,
    Group = 8,
    Goto = 9,
    SetQueue = 10,
    ApplyMeter = 11,
    Controller = 12,
    Drop = 13,
    ClearDeferred = 14,
    GroupDeferred = 15,
    SetVlanPcp = 16,
}

impl ActionType {
    fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => ActionType::Output,
            1 => ActionType::SetEthSrc,
            2 => ActionType::SetEthDst,
            3 => ActionType::PushVlan,
            4 => ActionType::PopVlan,
            5 => ActionType::SetVlanId,
            6 => ActionType::PushMpls,
            7 => ActionType::PopMpls,
            8 => ActionType::Group,
            9 => ActionType::Goto,
            10 => ActionType::SetQueue,
            11 => ActionType::ApplyMeter,
            12 => ActionType::Controller,
            13 => ActionType::Drop,
            14 => ActionType::ClearDeferred,
            15 => ActionType::GroupDeferred,
            16 => ActionType::SetVlanPcp,
            _ => return None,
        })
    }

    /// Tags whose payload is a bare 32-bit integer (the `ACTION_BIN` set
    /// from the original vocabulary).
    fn is_int_payload(self) -> bool {
        matches!(
            self,
            ActionType::Output
                | ActionType::PushVlan
                | ActionType::PopVlan
                | ActionType::SetVlanId
                | ActionType::PushMpls
                | ActionType::PopMpls
                | ActionType::Group
                | ActionType::Goto
                | ActionType::SetQueue
                | ActionType::ApplyMeter
                | ActionType::GroupDeferred
                | ActionType::SetVlanPcp
        )
    }
}

/// Special OpenFlow port number meaning "send to the controller".
pub const OFPP_CONTROLLER: u32 = 0xffff_fffd;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Action {
    Output(u32),
    SetEthSrc(MacAddress),
    SetEthDst(MacAddress),
    PushVlan(u32),
    PopVlan,
    SetVlanId(u32),
    PushMpls(u32),
    PopMpls,
    Group(u32),
    Goto(u32),
    SetQueue(u32),
    ApplyMeter(u32),
    Controller,
    Drop,
    ClearDeferred,
    GroupDeferred(u32),
    SetVlanPcp(u32),
    Unknown { action_type: u8, payload: Vec<u8> },
}

impl Action {
    /// `CONTROLLER` is spelled as `OUTPUT(OFPP_CONTROLLER)` in the original
    /// vocabulary; kept as a constructor so call sites read the same way.
    pub fn controller_output() -> Self {
        Action::Output(OFPP_CONTROLLER)
    }

    pub fn action_type(&self) -> u8 {
        match self {
            Action::Output(_) => ActionType::Output as u8,
            Action::SetEthSrc(_) => ActionType::SetEthSrc as u8,
            Action::SetEthDst(_) => ActionType::SetEthDst as u8,
            Action::PushVlan(_) => ActionType::PushVlan as u8,
            Action::PopVlan => ActionType::PopVlan as u8,
            Action::SetVlanId(_) => ActionType::SetVlanId as u8,
            Action::PushMpls(_) => ActionType::PushMpls as u8,
            Action::PopMpls => ActionType::PopMpls as u8,
            Action::Group(_) => ActionType::Group as u8,
            Action::Goto(_) => ActionType::Goto as u8,
            Action::SetQueue(_) => ActionType::SetQueue as u8,
            Action::ApplyMeter(_) => ActionType::ApplyMeter as u8,
            Action::Controller => ActionType::Controller as u8,
            Action::Drop => ActionType::Drop as u8,
            Action::ClearDeferred => ActionType::ClearDeferred as u8,
            Action::GroupDeferred(_) => ActionType::GroupDeferred as u8,
            Action::SetVlanPcp(_) => ActionType::SetVlanPcp as u8,
            Action::Unknown { action_type, .. } => *action_type,
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Action::Output(v)
            | Action::PushVlan(v)
            | Action::SetVlanId(v)
            | Action::PushMpls(v)
            | Action::Group(v)
            | Action::Goto(v)
            | Action::SetQueue(v)
            | Action::ApplyMeter(v)
            | Action::GroupDeferred(v)
            | Action::SetVlanPcp(v) => v.to_be_bytes().to_vec(),
            Action::SetEthSrc(mac) | Action::SetEthDst(mac) => mac.as_bytes().to_vec(),
            Action::PopVlan | Action::PopMpls | Action::Controller | Action::Drop | Action::ClearDeferred => {
                Vec::new()
            }
            Action::Unknown { payload, .. } => payload.clone(),
        }
    }

    pub fn decode(action_type: u8, payload: &[u8]) -> Self {
        match ActionType::from_u8(action_type) {
            Some(ActionType::Output) => Action::Output(read_u32(payload)),
            Some(ActionType::SetEthSrc) => Action::SetEthSrc(read_mac(payload)),
            Some(ActionType::SetEthDst) => Action::SetEthDst(read_mac(payload)),
            Some(ActionType::PushVlan) => Action::PushVlan(read_u32(payload)),
            Some(ActionType::PopVlan) => Action::PopVlan,
            Some(ActionType::SetVlanId) => Action::SetVlanId(read_u32(payload)),
            Some(ActionType::PushMpls) => Action::PushMpls(read_u32(payload)),
            Some(ActionType::PopMpls) => Action::PopMpls,
            Some(ActionType::Group) => Action::Group(read_u32(payload)),
            Some(ActionType::Goto) => Action::Goto(read_u32(payload)),
            Some(ActionType::SetQueue) => Action::SetQueue(read_u32(payload)),
            Some(ActionType::ApplyMeter) => Action::ApplyMeter(read_u32(payload)),
            Some(ActionType::Controller) => Action::Controller,
            Some(ActionType::Drop) => Action::Drop,
            Some(ActionType::ClearDeferred) => Action::ClearDeferred,
            Some(ActionType::GroupDeferred) => Action::GroupDeferred(read_u32(payload)),
            Some(ActionType::SetVlanPcp) => Action::SetVlanPcp(read_u32(payload)),
            None => Action::Unknown {
                action_type,
                payload: payload.to_vec(),
            },
        }
    }

    pub fn as_output_port(&self) -> Option<u32> {
        match self {
            Action::Output(p) => Some(*p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(a: Action) {
        let ty = a.action_type();
        let payload = a.encode_payload();
        assert_eq!(Action::decode(ty, &payload), a);
    }

    #[test]
    fn round_trips_every_variant() {
        round_trip(Action::Output(2));
        round_trip(Action::SetEthSrc(MacAddress::new([1; 6])));
        round_trip(Action::SetEthDst(MacAddress::new([2; 6])));
        round_trip(Action::PushVlan(0x8100));
        round_trip(Action::PopVlan);
        round_trip(Action::SetVlanId(42));
        round_trip(Action::Group(7));
        round_trip(Action::Goto(2));
        round_trip(Action::SetQueue(3));
        round_trip(Action::ApplyMeter(1));
        round_trip(Action::Controller);
        round_trip(Action::Drop);
        round_trip(Action::ClearDeferred);
        round_trip(Action::GroupDeferred(9));
        round_trip(Action::SetVlanPcp(7));
    }

    #[test]
    fn controller_output_is_output_with_controller_port() {
        assert_eq!(Action::controller_output(), Action::Output(OFPP_CONTROLLER));
    }

    #[test]
    fn unknown_action_round_trips() {
        let a = Action::decode(200, &[9, 9]);
        assert_eq!(a.encode_payload(), vec![9, 9]);
    }
}
