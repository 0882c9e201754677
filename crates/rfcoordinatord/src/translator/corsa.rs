//! The Corsa multi-table pipelines (§4.7 "Multi-table 'corsa-v1' and
//! 'corsa-v3' pipelines"): a deeper stage skeleton than NoviFlow's, and a
//! group-indirection cache in place of per-ingress-port rule fan-out —
//! the next-hop Ethernet destination of a forwarding rule selects or
//! allocates a group id, the actual action set is installed once as a
//! group, and the forwarding rule's actions collapse to a reference to it.

use std::collections::HashMap;

use rf_types::MacAddress;

use crate::codec::{Action, Match, RfOption};
use crate::message::{RouteMod, RouteModOp};
use crate::tables::IslEntry;

use super::{LocalPort, RouteModTranslator};

const TABLE_VLAN: u8 = 0;
const TABLE_ETHER: u8 = 1;
const TABLE_FIB: u8 = 2;
const TABLE_LOCAL: u8 = 3;

const PRIORITY_DEFAULT: u16 = 100;
const DEFAULT_METER_ID: u32 = 1;
const DEFAULT_VLAN_PCP: u32 = 7;
const DEFAULT_QUEUE_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorsaVariant {
    V1,
    V3,
}

/// A deep multi-table pipeline with group indirection for next-hop actions.
#[derive(Debug)]
pub struct CorsaTranslator {
    variant: CorsaVariant,
    next_group_id: u32,
    groups: HashMap<MacAddress, u32>,
}

impl CorsaTranslator {
    pub fn new(variant: CorsaVariant) -> Self {
        CorsaTranslator { variant, next_group_id: 1, groups: HashMap::new() }
    }

    fn rule(table_id: u8, matches: Vec<Match>, actions: Vec<Action>) -> RouteMod {
        let mut rm = RouteMod::new(RouteModOp::Add, 0, 0);
        rm.table_id = table_id;
        rm.matches = matches;
        rm.actions = actions;
        rm.options = vec![RfOption::Priority(PRIORITY_DEFAULT)];
        rm
    }

    /// Returns the group-reference action for `next_hop`, allocating and
    /// emitting an `ADD_GROUP` RouteMod the first time this next hop is
    /// seen, and nothing extra on every subsequent reuse.
    fn group_action(&mut self, next_hop: MacAddress, action_set: Vec<Action>) -> (std::option::Option<RouteMod>, Action) {
        if let Some(&group_id) = self.groups.get(&next_hop) {
            return (None, self.reference(group_id));
        }
        let group_id = self.next_group_id;
        self.next_group_id += 1;
        self.groups.insert(next_hop, group_id);

        let mut add_group = RouteMod::new(RouteModOp::AddGroup, 0, 0);
        add_group.group_id = group_id;
        add_group.actions = action_set;
        (Some(add_group), self.reference(group_id))
    }

    fn reference(&self, group_id: u32) -> Action {
        match self.variant {
            CorsaVariant::V1 => Action::Group(group_id),
            CorsaVariant::V3 => Action::GroupDeferred(group_id),
        }
    }

    /// A VLAN-tagged match needs a `VLAN_TABLE` hop before the ether table:
    /// v1 strips the tag, v3 additionally sets the PCP/queue and applies the
    /// default meter.
    fn vlan_table_rule(&self, vlan_match: Match) -> RouteMod {
        let mut actions = match self.variant {
            CorsaVariant::V1 => vec![Action::PopVlan],
            CorsaVariant::V3 => vec![
                Action::SetVlanPcp(DEFAULT_VLAN_PCP),
                Action::SetQueue(DEFAULT_QUEUE_ID),
                Action::ApplyMeter(DEFAULT_METER_ID),
            ],
        };
        actions.push(Action::Goto(TABLE_ETHER as u32));
        Self::rule(TABLE_VLAN, vec![vlan_match], actions)
    }
}

impl RouteModTranslator for CorsaTranslator {
    fn configure_datapath(&mut self) -> Vec<RouteMod> {
        let mut rules = vec![
            Self::rule(TABLE_VLAN, vec![], vec![Action::Goto(TABLE_ETHER as u32)]),
            Self::rule(TABLE_ETHER, vec![], vec![Action::Goto(TABLE_FIB as u32)]),
            Self::rule(TABLE_FIB, vec![], vec![Action::Drop]),
            Self::rule(TABLE_LOCAL, vec![], vec![Action::controller_output()]),
        ];
        if self.variant == CorsaVariant::V3 {
            let mut default_meter = RouteMod::new(RouteModOp::AddMeter, 0, 0);
            default_meter.meter_id = DEFAULT_METER_ID;
            rules.push(default_meter);
        }
        rules
    }

    fn handle_controller_route_mod(&mut self, port: &LocalPort, rm: &RouteMod) -> Vec<RouteMod> {
        let actions = match port.fastpath {
            Some((fp_port, label)) => vec![Action::PushVlan(0x8100), Action::SetVlanId(label as u32), Action::Output(fp_port)],
            None => vec![Action::Goto(TABLE_LOCAL as u32)],
        };
        vec![Self::rule(TABLE_FIB, rm.matches.clone(), actions)]
    }

    fn handle_route_mod(&mut self, egress: &LocalPort, rm: &RouteMod, _other_ports: &[LocalPort]) -> Vec<RouteMod> {
        let (add_group, reference) = self.group_action(egress.eth_addr, vec![Action::Output(egress.dp_port)]);

        let mut out = Vec::new();
        if let Some(vlan_match) = rm.matches.iter().find(|m| matches!(m, Match::VlanId { .. })).cloned() {
            out.push(self.vlan_table_rule(vlan_match));
        }
        out.extend(add_group);
        out.push(Self::rule(TABLE_FIB, rm.matches.clone(), vec![reference]));
        out
    }

    fn handle_isl_route_mod(&mut self, isl: &IslEntry, rm: &RouteMod, _other_ports: &[LocalPort]) -> Vec<RouteMod> {
        let (Some(dp_port), Some(eth), Some(rem_eth)) = (isl.dp_port, isl.eth_addr, isl.rem_eth_addr) else {
            return Vec::new();
        };
        let (add_group, reference) =
            self.group_action(rem_eth, vec![Action::SetEthSrc(eth), Action::SetEthDst(rem_eth), Action::Output(dp_port)]);

        let mut out = Vec::new();
        out.extend(add_group);
        out.push(Self::rule(TABLE_FIB, rm.matches.clone(), vec![reference]));
        out
    }
}
