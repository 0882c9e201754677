//! Band TLVs: the per-rate-limit bands that make up a meter.
//!
//! Every band carries a 4-byte rate and 4-byte burst, followed by a
//! type-specific trailer.

use super::read_u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BandType {
    Drop = 1,
    DscpRemark = 2,
    Experimenter = 255,
}

impl BandType {
    fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => BandType::Drop,
            2 => BandType::DscpRemark,
            255 => BandType::Experimenter,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Band {
    Drop { rate: u32, burst: u32 },
    DscpRemark { rate: u32, burst: u32, prec_level: u8 },
    Experimenter { rate: u32, burst: u32, experimenter: u32 },
    Unknown { band_type: u8, payload: Vec<u8> },
}

impl Band {
    pub fn band_type(&self) -> u8 {
        match self {
            Band::Drop { .. } => BandType::Drop as u8,
            Band::DscpRemark { .. } => BandType::DscpRemark as u8,
            Band::Experimenter { .. } => BandType::Experimenter as u8,
            Band::Unknown { band_type, .. } => *band_type,
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Band::Drop { rate, burst } => {
                buf.extend_from_slice(&rate.to_be_bytes());
                buf.extend_from_slice(&burst.to_be_bytes());
            }
            Band::DscpRemark { rate, burst, prec_level } => {
                buf.extend_from_slice(&rate.to_be_bytes());
                buf.extend_from_slice(&burst.to_be_bytes());
                buf.push(*prec_level);
            }
            Band::Experimenter { rate, burst, experimenter } => {
                buf.extend_from_slice(&rate.to_be_bytes());
                buf.extend_from_slice(&burst.to_be_bytes());
                buf.extend_from_slice(&experimenter.to_be_bytes());
            }
            Band::Unknown { payload, .. } => return payload.clone(),
        }
        buf
    }

    pub fn decode(band_type: u8, payload: &[u8]) -> Self {
        let rate = read_u32(payload);
        let burst = if payload.len() >= 8 { read_u32(&payload[4..]) } else { 0 };
        match BandType::from_u8(band_type) {
            Some(BandType::Drop) => Band::Drop { rate, burst },
            Some(BandType::DscpRemark) => Band::DscpRemark {
                rate,
                burst,
                prec_level: payload.get(8).copied().unwrap_or(0),
            },
            Some(BandType::Experimenter) => Band::Experimenter {
                rate,
                burst,
                experimenter: if payload.len() >= 12 { read_u32(&payload[8..]) } else { 0 },
            },
            None => Band::Unknown {
                band_type,
                payload: payload.to_vec(),
            },
        }
    }
}
