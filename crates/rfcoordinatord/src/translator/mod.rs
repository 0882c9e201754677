//! RouteMod translator hierarchy (C7, §4.7): one instance per datapath,
//! responsible for rewriting an abstract RouteMod into the ordered,
//! vendor-correct flow-table rule sequence that datapath actually needs.
//!
//! Vendor selection (§4.7): `multitabledps` keys by dp_id take precedence,
//! then `satellitedps` membership, then the default single-table pipeline.
//! The default/satellite relationship is extension-by-override of exactly
//! `handle_isl_route_mod` (§9 "duck-typed translator hierarchy") — expressed
//! here as composition (`SatelliteRouteModTranslator` wraps a `DefaultRouteModTranslator`)
//! rather than inheritance, since traits don't carry state.

mod corsa;
mod default;
mod noviflow;
mod satellite;

pub use corsa::{CorsaTranslator, CorsaVariant};
pub use default::DefaultRouteModTranslator;
pub use noviflow::NoviFlowTranslator;
pub use satellite::SatelliteRouteModTranslator;

use crate::message::RouteMod;
use crate::tables::IslEntry;

/// One local endpoint a translator can fan a rule out to: a bound virtual
/// port, or the local side of an active ISL. When fastpath is enabled for
/// this specific port, `fastpath` names the egress port and VLAN label to
/// use instead of punting to the controller.
#[derive(Debug, Clone, Copy)]
pub struct LocalPort {
    pub dp_port: u32,
    pub eth_addr: rf_types::MacAddress,
    pub fastpath: std::option::Option<(u32, u16)>,
}

/// Vendor identity, selected once per datapath at first-port registration
/// (§4.7, §9 "module-level state": the name→vendor map is resolved once
/// during config loading rather than re-parsed per lookup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Default,
    Satellite,
    NoviFlow,
    CorsaV1,
    CorsaV3,
}

impl Vendor {
    /// Parses a `-m`/vendor-spec name. `None` on anything unrecognized —
    /// callers log and fall back to `Default` rather than abort (§7).
    pub fn from_name(name: &str) -> std::option::Option<Self> {
        match name {
            "noviflow" => Some(Vendor::NoviFlow),
            "corsa" | "corsa-v1" => Some(Vendor::CorsaV1),
            "corsa-v3" => Some(Vendor::CorsaV3),
            _ => None,
        }
    }
}

/// A per-datapath translator: converts abstract RouteMods into the rule
/// sequence that datapath's own flow tables need (§4.7).
pub trait RouteModTranslator: std::fmt::Debug + Send {
    /// One-shot table setup, emitted the first time any port of this
    /// datapath registers (§4.5 step 2).
    fn configure_datapath(&mut self) -> Vec<RouteMod>;

    /// Translates a client request to punt matching traffic to the routing
    /// stack, rewriting it into whatever the datapath needs to reach the
    /// controller (or the fastpath egress, when enabled for this port).
    fn handle_controller_route_mod(&mut self, port: &LocalPort, rm: &RouteMod) -> Vec<RouteMod>;

    /// Translates an `ADD`/`DELETE` forwarding rule, fanning it out over
    /// every other active local port per §4.7.
    fn handle_route_mod(&mut self, egress: &LocalPort, rm: &RouteMod, other_ports: &[LocalPort]) -> Vec<RouteMod>;

    /// Rewrites a RouteMod for fan-out across an active ISL: swaps
    /// source/destination MAC for the link's addresses and outputs on the
    /// ISL port, repeating the local-port fan-out of [`handle_route_mod`].
    fn handle_isl_route_mod(&mut self, isl: &IslEntry, rm: &RouteMod, other_ports: &[LocalPort]) -> Vec<RouteMod>;
}

/// Selects the vendor for a freshly-registered datapath, consulting the
/// override tables in the order §4.7 specifies.
pub fn select_vendor(
    dp_id: u64,
    multitabledps: &std::collections::HashMap<u64, Vendor>,
    satellitedps: &std::collections::HashSet<u64>,
) -> Vendor {
    if let Some(vendor) = multitabledps.get(&dp_id) {
        return *vendor;
    }
    if satellitedps.contains(&dp_id) {
        return Vendor::Satellite;
    }
    Vendor::Default
}

/// Constructs a fresh translator instance for the given vendor.
pub fn new_translator(vendor: Vendor) -> Box<dyn RouteModTranslator> {
    match vendor {
        Vendor::Default => Box::new(DefaultRouteModTranslator::new()),
        Vendor::Satellite => Box::new(SatelliteRouteModTranslator::new()),
        Vendor::NoviFlow => Box::new(NoviFlowTranslator::new()),
        Vendor::CorsaV1 => Box::new(CorsaTranslator::new(CorsaVariant::V1)),
        Vendor::CorsaV3 => Box::new(CorsaTranslator::new(CorsaVariant::V3)),
    }
}
