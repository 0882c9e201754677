//! The satellite pipeline (§4.7 "Satellite pipeline"): identical to the
//! default single-table pipeline except for ISL handling, which additionally
//! installs a pair of default-priority catch-all rules toward each remote
//! ISL Ethernet address — but only once per address, tracked in `sent_isl_dl`.

use std::collections::HashSet;

use rf_types::MacAddress;

use crate::codec::{Action, Match, RfOption};
use crate::message::{RouteMod, RouteModOp};
use crate::tables::IslEntry;

use super::{DefaultRouteModTranslator, LocalPort, RouteModTranslator};

const TABLE_DEFAULT: u8 = 0;
const PRIORITY_DEFAULT: u16 = 100;
const ETHERTYPE_IP: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;

#[derive(Debug)]
pub struct SatelliteRouteModTranslator {
    inner: DefaultRouteModTranslator,
    sent_isl_dl: HashSet<MacAddress>,
}

impl SatelliteRouteModTranslator {
    pub fn new() -> Self {
        SatelliteRouteModTranslator {
            inner: DefaultRouteModTranslator::new(),
            sent_isl_dl: HashSet::new(),
        }
    }

    fn isl_bootstrap_rules(dp_port: u32, rem_eth: MacAddress) -> Vec<RouteMod> {
        [ETHERTYPE_IP, ETHERTYPE_IPV6]
            .into_iter()
            .map(|ethertype| {
                let mut rm = RouteMod::new(RouteModOp::Add, 0, 0);
                rm.table_id = TABLE_DEFAULT;
                rm.matches = vec![Match::EtherType(ethertype), Match::Ethernet(rem_eth)];
                rm.actions = vec![Action::Output(dp_port)];
                rm.options = vec![RfOption::Priority(PRIORITY_DEFAULT)];
                rm
            })
            .collect()
    }
}

impl RouteModTranslator for SatelliteRouteModTranslator {
    fn configure_datapath(&mut self) -> Vec<RouteMod> {
        self.inner.configure_datapath()
    }

    fn handle_controller_route_mod(&mut self, port: &LocalPort, rm: &RouteMod) -> Vec<RouteMod> {
        self.inner.handle_controller_route_mod(port, rm)
    }

    fn handle_route_mod(&mut self, egress: &LocalPort, rm: &RouteMod, other_ports: &[LocalPort]) -> Vec<RouteMod> {
        self.inner.handle_route_mod(egress, rm, other_ports)
    }

    fn handle_isl_route_mod(&mut self, isl: &IslEntry, rm: &RouteMod, other_ports: &[LocalPort]) -> Vec<RouteMod> {
        let (Some(dp_port), Some(rem_eth)) = (isl.dp_port, isl.rem_eth_addr) else {
            return Vec::new();
        };

        let mut out = if self.sent_isl_dl.insert(rem_eth) {
            Self::isl_bootstrap_rules(dp_port, rem_eth)
        } else {
            Vec::new()
        };
        out.extend(self.inner.handle_isl_route_mod(isl, rm, other_ports));
        out
    }
}
