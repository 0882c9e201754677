//! The single-table default pipeline (§4.7 "Default pipeline"): every
//! datapath with no vendor override uses this translator directly, and
//! [`super::SatelliteRouteModTranslator`] wraps it, overriding only
//! `handle_isl_route_mod`.

use crate::codec::{Action, Match, RfOption};
use crate::message::{RouteMod, RouteModOp};
use crate::tables::IslEntry;

use super::{LocalPort, RouteModTranslator};

const TABLE_DEFAULT: u8 = 0;
const PRIORITY_DEFAULT: u16 = 100;
const PRIORITY_ARP: u16 = 200;

const ETHERTYPE_IP: u16 = 0x0800;
const ETHERTYPE_ARP: u16 = 0x0806;

/// Single-table pipeline: one flow table, ARP punted to the controller (or
/// fastpath egress), IP forwarding rules fanned out over every other local
/// port so the egress rule only ever matches traffic that didn't originate
/// on the egress port itself.
#[derive(Debug, Default)]
pub struct DefaultRouteModTranslator;

impl DefaultRouteModTranslator {
    pub fn new() -> Self {
        DefaultRouteModTranslator
    }

    fn fan_out_rule(rm: &RouteMod, other: &LocalPort, actions: Vec<Action>) -> RouteMod {
        let mut out = rm.clone();
        out.table_id = TABLE_DEFAULT;
        out.matches.push(Match::Ethernet(other.eth_addr));
        out.matches.push(Match::InPort(other.dp_port));
        out.actions = actions;
        out
    }
}

impl RouteModTranslator for DefaultRouteModTranslator {
    fn configure_datapath(&mut self) -> Vec<RouteMod> {
        let mut delete_group = RouteMod::new(RouteModOp::DeleteGroup, 0, 0);
        delete_group.table_id = TABLE_DEFAULT;

        let mut delete_all = RouteMod::new(RouteModOp::Delete, 0, 0);
        delete_all.table_id = TABLE_DEFAULT;

        let mut drop_ip = RouteMod::new(RouteModOp::Add, 0, 0);
        drop_ip.table_id = TABLE_DEFAULT;
        drop_ip.matches = vec![Match::EtherType(ETHERTYPE_IP)];
        drop_ip.actions = vec![Action::Drop];
        drop_ip.options = vec![RfOption::Priority(PRIORITY_DEFAULT)];

        let mut arp_to_controller = RouteMod::new(RouteModOp::Add, 0, 0);
        arp_to_controller.table_id = TABLE_DEFAULT;
        arp_to_controller.matches = vec![Match::EtherType(ETHERTYPE_ARP)];
        arp_to_controller.actions = vec![Action::controller_output()];
        arp_to_controller.options = vec![RfOption::Priority(PRIORITY_ARP)];

        vec![delete_group, delete_all, drop_ip, arp_to_controller]
    }

    fn handle_controller_route_mod(&mut self, port: &LocalPort, rm: &RouteMod) -> Vec<RouteMod> {
        let mut out = rm.clone();
        out.table_id = TABLE_DEFAULT;
        out.actions = match port.fastpath {
            Some((fp_port, label)) => vec![Action::PushVlan(0x8100), Action::SetVlanId(label as u32), Action::Output(fp_port)],
            None => vec![Action::controller_output()],
        };
        vec![out]
    }

    fn handle_route_mod(&mut self, egress: &LocalPort, rm: &RouteMod, other_ports: &[LocalPort]) -> Vec<RouteMod> {
        other_ports
            .iter()
            .map(|other| Self::fan_out_rule(rm, other, vec![Action::Output(egress.dp_port)]))
            .collect()
    }

    fn handle_isl_route_mod(&mut self, isl: &IslEntry, rm: &RouteMod, other_ports: &[LocalPort]) -> Vec<RouteMod> {
        let (Some(dp_port), Some(eth), Some(rem_eth)) = (isl.dp_port, isl.eth_addr, isl.rem_eth_addr) else {
            return Vec::new();
        };
        other_ports
            .iter()
            .map(|other| {
                Self::fan_out_rule(rm, other, vec![Action::SetEthSrc(eth), Action::SetEthDst(rem_eth), Action::Output(dp_port)])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_types::MacAddress;

    fn mac(n: u8) -> MacAddress {
        MacAddress::new([n; 6])
    }

    #[test]
    fn configure_datapath_clears_state_then_drops_ip_and_punts_arp() {
        let mut t = DefaultRouteModTranslator::new();
        let rules = t.configure_datapath();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].operation, RouteModOp::DeleteGroup);
        assert_eq!(rules[1].operation, RouteModOp::Delete);
        assert_eq!(rules[2].matches, vec![Match::EtherType(ETHERTYPE_IP)]);
        assert_eq!(rules[2].actions, vec![Action::Drop]);
        assert_eq!(rules[3].matches, vec![Match::EtherType(ETHERTYPE_ARP)]);
        assert_eq!(rules[3].actions, vec![Action::controller_output()]);
    }

    #[test]
    fn handle_route_mod_with_no_other_ports_emits_nothing() {
        let mut t = DefaultRouteModTranslator::new();
        let egress = LocalPort { dp_port: 2, eth_addr: mac(0xaa), fastpath: None };
        let rm = RouteMod::new(RouteModOp::Add, 0xff, 1).with_ct_id(0);
        let out = t.handle_route_mod(&egress, &rm, &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn handle_route_mod_fans_out_over_other_ports() {
        let mut t = DefaultRouteModTranslator::new();
        let egress = LocalPort { dp_port: 2, eth_addr: mac(0xaa), fastpath: None };
        let other = LocalPort { dp_port: 3, eth_addr: mac(0xbb), fastpath: None };
        let mut rm = RouteMod::new(RouteModOp::Add, 0xff, 1);
        rm.matches.push(Match::EtherType(0x0800));

        let out = t.handle_route_mod(&egress, &rm, &[other]);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].matches,
            vec![Match::EtherType(0x0800), Match::Ethernet(mac(0xbb)), Match::InPort(3)]
        );
        assert_eq!(out[0].actions, vec![Action::Output(2)]);
    }

    #[test]
    fn handle_controller_route_mod_uses_fastpath_when_enabled() {
        let mut t = DefaultRouteModTranslator::new();
        let port = LocalPort { dp_port: 2, eth_addr: mac(0xaa), fastpath: Some((9, 42)) };
        let rm = RouteMod::new(RouteModOp::Controller, 0xff, 1);
        let out = t.handle_controller_route_mod(&port, &rm);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].actions, vec![Action::PushVlan(0x8100), Action::SetVlanId(42), Action::Output(9)]);
    }
}
