//! Option TLVs: per-RouteMod modifiers that sit alongside matches/actions.

use super::read_u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OptionType {
    Priority = 0,
    /// Identifies the target controller. Added automatically to every
    /// outbound RouteMod before send — see §8 invariant: every outbound
    /// RouteMod carries a `CT_ID` option.
    CtId = 1,
    IdleTimeout = 2,
    HardTimeout = 3,
}

impl OptionType {
    fn from_u8(tag: u8) -> std::option::Option<Self> {
        Some(match tag {
            0 => OptionType::Priority,
            1 => OptionType::CtId,
            2 => OptionType::IdleTimeout,
            3 => OptionType::HardTimeout,
            _ => return None,
        })
    }
}

/// Named `RmOption` (not `Option`) so it never shadows `std::option::Option`
/// at any call site that imports this module's contents.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RmOption {
    Priority(u16),
    CtId(u32),
    IdleTimeout(u16),
    HardTimeout(u16),
    Unknown { option_type: u8, payload: Vec<u8> },
}

impl RmOption {
    pub fn option_type(&self) -> u8 {
        match self {
            RmOption::Priority(_) => OptionType::Priority as u8,
            RmOption::CtId(_) => OptionType::CtId as u8,
            RmOption::IdleTimeout(_) => OptionType::IdleTimeout as u8,
            RmOption::HardTimeout(_) => OptionType::HardTimeout as u8,
            RmOption::Unknown { option_type, .. } => *option_type,
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            RmOption::Priority(v) => (*v as u32).to_be_bytes()[2..].to_vec(),
            RmOption::CtId(v) => v.to_be_bytes().to_vec(),
            RmOption::IdleTimeout(v) | RmOption::HardTimeout(v) => (*v as u32).to_be_bytes()[2..].to_vec(),
            RmOption::Unknown { payload, .. } => payload.clone(),
        }
    }

    pub fn decode(option_type: u8, payload: &[u8]) -> Self {
        match OptionType::from_u8(option_type) {
            Some(OptionType::Priority) => RmOption::Priority(super::read_u16(payload)),
            Some(OptionType::CtId) => RmOption::CtId(read_u32(payload)),
            Some(OptionType::IdleTimeout) => RmOption::IdleTimeout(super::read_u16(payload)),
            Some(OptionType::HardTimeout) => RmOption::HardTimeout(super::read_u16(payload)),
            None => RmOption::Unknown {
                option_type,
                payload: payload.to_vec(),
            },
        }
    }

    pub fn as_ct_id(&self) -> std::option::Option<u32> {
        match self {
            RmOption::CtId(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(o: RmOption) {
        let ty = o.option_type();
        let payload = o.encode_payload();
        assert_eq!(RmOption::decode(ty, &payload), o);
    }

    #[test]
    fn round_trips_every_variant() {
        round_trip(RmOption::Priority(100));
        round_trip(RmOption::CtId(0));
        round_trip(RmOption::IdleTimeout(30));
        round_trip(RmOption::HardTimeout(60));
    }
}
