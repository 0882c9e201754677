//! Typed value codecs for the four TLV families carried by a [`RouteMod`](crate::message::RouteMod):
//! matches, actions, options, and meter bands.
//!
//! Every TLV is `(type: u8, payload: bytes)` with the payload's meaning and
//! length implied entirely by the type tag — there is no explicit length
//! field on the wire. Each family is a Rust enum so that `encode` and
//! `decode` are exhaustive and `decode(encode(v)) == v` holds for every
//! variant by construction; unrecognized type tags round-trip through an
//! `Unknown` variant that carries the raw payload through unchanged.

mod action;
mod band;
mod match_;
mod option;

pub use action::{Action, ActionType};
pub use band::{Band, BandType};
pub use match_::{Match, MatchType};
pub use option::{OptionType, RmOption as RfOption};

/// Reads a big-endian `u32` from a payload, clamping to zero on a
/// short/malformed buffer rather than rejecting it (permissive setters,
/// see error handling design).
pub(crate) fn read_u32(payload: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    let n = payload.len().min(4);
    buf[..n].copy_from_slice(&payload[..n]);
    u32::from_be_bytes(buf)
}

pub(crate) fn read_u16(payload: &[u8]) -> u16 {
    let mut buf = [0u8; 2];
    let n = payload.len().min(2);
    buf[..n].copy_from_slice(&payload[..n]);
    u16::from_be_bytes(buf)
}

pub(crate) fn read_mac(payload: &[u8]) -> rf_types::MacAddress {
    let mut buf = [0u8; 6];
    let n = payload.len().min(6);
    buf[..n].copy_from_slice(&payload[..n]);
    rf_types::MacAddress::new(buf)
}
