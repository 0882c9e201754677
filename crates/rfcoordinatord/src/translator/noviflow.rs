//! The NoviFlow multi-table pipeline (§4.7 "Multi-table 'noviflow' pipeline"):
//! entry table → ether table → FIB table (+ optional fastpath table).
//!
//! Unlike the single-table pipelines, forwarding rules never fan out over
//! "every other local port" — the FIB table's L3 match is already
//! unambiguous, so `other_ports` is accepted for interface parity with
//! [`super::RouteModTranslator`] but intentionally unused.

use crate::codec::{Action, Match, RfOption};
use crate::message::{RouteMod, RouteModOp};
use crate::tables::IslEntry;

use super::{LocalPort, RouteModTranslator};

const TABLE_ENTRY: u8 = 0;
const TABLE_ETHER: u8 = 1;
const TABLE_FIB: u8 = 2;

/// The device rebuilds its whole table on any priority change, so every
/// rule this translator installs uses the same priority (§4.7).
const PRIORITY_HIGH: u16 = 0x7fff;

const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_IP: u16 = 0x0800;

/// `OFPP_FLOOD`-equivalent sentinel: broadcast traffic is flooded rather
/// than routed, handled entirely within the ether table.
const FLOOD_PORT: u32 = 0xffff_fffb;

#[derive(Debug, Default)]
pub struct NoviFlowTranslator;

impl NoviFlowTranslator {
    pub fn new() -> Self {
        NoviFlowTranslator
    }

    fn priority_rule(table_id: u8, matches: Vec<Match>, actions: Vec<Action>) -> RouteMod {
        let mut rm = RouteMod::new(RouteModOp::Add, 0, 0);
        rm.table_id = table_id;
        rm.matches = matches;
        rm.actions = actions;
        rm.options = vec![RfOption::Priority(PRIORITY_HIGH)];
        rm
    }
}

impl RouteModTranslator for NoviFlowTranslator {
    fn configure_datapath(&mut self) -> Vec<RouteMod> {
        vec![
            Self::priority_rule(TABLE_ENTRY, vec![], vec![Action::Goto(TABLE_ETHER as u32)]),
            Self::priority_rule(TABLE_ETHER, vec![Match::Ethernet(rf_types::MacAddress::BROADCAST)], vec![Action::Output(FLOOD_PORT)]),
            Self::priority_rule(TABLE_ETHER, vec![Match::EtherType(ETHERTYPE_ARP)], vec![Action::controller_output()]),
            Self::priority_rule(TABLE_ETHER, vec![Match::EtherType(ETHERTYPE_IP)], vec![Action::Goto(TABLE_FIB as u32)]),
            Self::priority_rule(TABLE_FIB, vec![], vec![Action::Drop]),
        ]
    }

    fn handle_controller_route_mod(&mut self, port: &LocalPort, rm: &RouteMod) -> Vec<RouteMod> {
        let l3_matches: Vec<Match> = rm.matches.iter().filter(|m| m.as_ethernet().is_none()).cloned().collect();
        let fib_actions = match port.fastpath {
            Some((fp_port, label)) => vec![Action::PushVlan(0x8100), Action::SetVlanId(label as u32), Action::Output(fp_port)],
            None => vec![Action::controller_output()],
        };
        let mut out = vec![Self::priority_rule(TABLE_FIB, l3_matches, fib_actions)];

        if let Some(mac) = rm.matches.iter().find_map(Match::as_ethernet) {
            out.push(Self::priority_rule(
                TABLE_ETHER,
                vec![Match::Ethernet(*mac)],
                vec![Action::Goto(TABLE_FIB as u32)],
            ));
        }
        out
    }

    fn handle_route_mod(&mut self, egress: &LocalPort, rm: &RouteMod, _other_ports: &[LocalPort]) -> Vec<RouteMod> {
        vec![Self::priority_rule(TABLE_FIB, rm.matches.clone(), vec![Action::Output(egress.dp_port)])]
    }

    fn handle_isl_route_mod(&mut self, isl: &IslEntry, rm: &RouteMod, _other_ports: &[LocalPort]) -> Vec<RouteMod> {
        let (Some(dp_port), Some(eth), Some(rem_eth)) = (isl.dp_port, isl.eth_addr, isl.rem_eth_addr) else {
            return Vec::new();
        };
        vec![Self::priority_rule(
            TABLE_FIB,
            rm.matches.clone(),
            vec![Action::SetEthSrc(eth), Action::SetEthDst(rem_eth), Action::Output(dp_port)],
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_types::MacAddress;

    #[test]
    fn configure_datapath_lays_down_the_three_table_skeleton() {
        let mut t = NoviFlowTranslator::new();
        let rules = t.configure_datapath();
        assert!(rules.iter().any(|r| r.table_id == TABLE_ENTRY));
        assert!(rules.iter().any(|r| r.table_id == TABLE_ETHER));
        assert!(rules.iter().any(|r| r.table_id == TABLE_FIB));
        assert!(rules.iter().all(|r| r.options == vec![RfOption::Priority(PRIORITY_HIGH)]));
    }

    #[test]
    fn controller_route_mod_splits_into_fib_and_ether_classifier() {
        let mut t = NoviFlowTranslator::new();
        let port = LocalPort { dp_port: 2, eth_addr: MacAddress::new([0xaa; 6]), fastpath: None };
        let mut rm = RouteMod::new(RouteModOp::Controller, 0xff, 1);
        rm.matches = vec![Match::EtherType(ETHERTYPE_IP), Match::Ethernet(MacAddress::new([0xbb; 6]))];

        let out = t.handle_controller_route_mod(&port, &rm);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].table_id, TABLE_FIB);
        assert_eq!(out[0].matches, vec![Match::EtherType(ETHERTYPE_IP)]);
        assert_eq!(out[1].table_id, TABLE_ETHER);
        assert_eq!(out[1].matches, vec![Match::Ethernet(MacAddress::new([0xbb; 6]))]);
    }

    #[test]
    fn forwarding_rule_never_fans_out_by_in_port() {
        let mut t = NoviFlowTranslator::new();
        let egress = LocalPort { dp_port: 2, eth_addr: MacAddress::new([0xaa; 6]), fastpath: None };
        let other = LocalPort { dp_port: 3, eth_addr: MacAddress::new([0xbb; 6]), fastpath: None };
        let rm = RouteMod::new(RouteModOp::Add, 0xff, 1);
        let out = t.handle_route_mod(&egress, &rm, &[other]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].actions, vec![Action::Output(2)]);
        assert!(!out[0].matches.iter().any(|m| m.as_in_port().is_some()));
    }
}
