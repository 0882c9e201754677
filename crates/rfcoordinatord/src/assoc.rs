//! Association state machine (C5, §4.5): pairs virtual-side and
//! datapath-side half-registrations into associations, and registers the
//! ISL half a datapath port turns out to represent.
//!
//! This module owns table mutations only. It never touches the translator
//! cache or the IPC fabric (§4.8 owns both) — instead it reports what the
//! caller must do next as an [`Effect`], and [`resolve_route_mod_target`]
//! reports only whether a RouteMod's association exists at all, so that
//! the translator-cache-after-association-check ordering required by §9
//! is structural rather than a convention callers have to remember.

use rf_types::MacAddress;
use tracing::{debug, warn};

use crate::error::CoordinatorError;
use crate::message::PortConfigOp;
use crate::tables::{
    Association, AssociationStatus, AssociationTable, IslEntry, IslSide, IslStatus, IslTable, RfConfig, RfIslConf,
};

/// The datapath id reserved for the local virtual switch. It never
/// represents a real forwarding element and is never registered as one
/// (§4.5 step 1). The CSV configs never name it, so any concrete sentinel
/// works; a real datapath id is never configured as `0`.
const RFVS_DPID: u64 = 0;

pub fn is_rfvs(dp_id: u64) -> bool {
    dp_id == RFVS_DPID
}

/// Work the caller (C8) must carry out after a state transition: which
/// translator to bootstrap, and which outbound messages to send.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// First port ever seen for this datapath: instantiate its translator
    /// and emit `configure_datapath()` (§4.5 step 2).
    ConfigureDatapath { ct_id: u32, dp_id: u64 },
    /// Splice the physical port to the virtual-switch port, sent to the
    /// proxy owning `ct_id`.
    DataPlaneMap { ct_id: u32, dp_id: u64, dp_port: u32, vs_id: u64, vs_port: u32 },
    /// Coordinator-to-client control message.
    PortConfig { vm_id: u64, vm_port: u32, operation: PortConfigOp },
}

/// `PortRegister` (§4.5 "On PortRegister"). Never produces an effect: the
/// original only inserts or completes a row, it never sends a message.
pub fn register_vm_port(assoc: &mut AssociationTable, config: &RfConfig, vm_id: u64, vm_port: u32, eth_addr: MacAddress) {
    let Some(cfg) = config.find_by_vm(vm_id, vm_port) else {
        debug!(vm_id, vm_port, "no RFConfig entry for vm port, registering idle");
        assoc.put(None, Association::idle_vm_port(vm_id, vm_port, eth_addr));
        return;
    };
    let (ct_id, dp_id, dp_port) = (cfg.ct_id, cfg.dp_id, cfg.dp_port);

    match assoc.find_by_dp_mut(ct_id, dp_id, dp_port) {
        None => {
            assoc.put(None, Association::idle_vm_port(vm_id, vm_port, eth_addr));
        }
        Some((_, entry)) if entry.status() == AssociationStatus::IdleDpPort => {
            entry.complete_from_vm_side(vm_id, vm_port, eth_addr);
            debug!(vm_id, vm_port, dp_id, dp_port, "vm port completed association");
        }
        Some(_) => {
            // Already associated/active under a different vm port or a
            // duplicate registration: leave the existing pairing alone.
        }
    }
}

/// Registers one declared ISL half for `(ct_id, dp_id, dp_port)`, pairing
/// it with the symmetric half if the other side already registered
/// (§4.5 "ISL registration"). Returns `true` if any `RFISLConf` entry
/// matched this port at all, so the caller knows not to fall back to
/// inserting a bare `IDLE_DP_PORT` association.
fn register_isl_port(islconf: &RfIslConf, isltable: &mut IslTable, ct_id: u32, dp_id: u64, dp_port: u32) -> bool {
    let matches = islconf.matching(ct_id, dp_id, dp_port);
    if matches.is_empty() {
        return false;
    }

    for conf in matches {
        let Some((side, other_eth)) = conf.side_for(ct_id, dp_id, dp_port) else {
            continue;
        };
        let my_eth = match side {
            IslSide::Local => conf.eth_addr,
            IslSide::Remote => conf.rem_eth_addr,
        };

        match isltable.find_by_local_eth(&other_eth).map(|(id, _)| id) {
            None => {
                isltable.put(None, IslEntry::idle_dp_port(conf.vm_id, ct_id, dp_id, dp_port, my_eth));
                debug!(dp_id, dp_port, "isl half registered, awaiting remote");
            }
            Some(id) => {
                let entry = isltable.get_mut(id).expect("id just looked up in the same table");
                if entry.status() == IslStatus::IdleDpPort {
                    entry.fill_remote(ct_id, dp_id, dp_port, my_eth);
                    debug!(dp_id, dp_port, "isl pairing completed, both halves active");
                }
            }
        }
    }
    true
}

/// `DatapathPortRegister` (§4.5 "On DatapathPortRegister").
pub fn register_dp_port(
    assoc: &mut AssociationTable,
    isltable: &mut IslTable,
    config: &RfConfig,
    islconf: &RfIslConf,
    ct_id: u32,
    dp_id: u64,
    dp_port: u32,
) -> Vec<Effect> {
    if is_rfvs(dp_id) {
        return Vec::new();
    }

    let mut effects = Vec::new();
    if !assoc.has_any_entry_for(ct_id, dp_id) && isltable.on_datapath(ct_id, dp_id).is_empty() {
        effects.push(Effect::ConfigureDatapath { ct_id, dp_id });
    }

    match config.find_by_dp(ct_id, dp_id, dp_port) {
        None => {
            if !register_isl_port(islconf, isltable, ct_id, dp_id, dp_port) {
                assoc.put(None, Association::idle_dp_port(ct_id, dp_id, dp_port));
            }
        }
        Some(cfg) => {
            let (vm_id, vm_port) = (cfg.vm_id, cfg.vm_port);
            match assoc.find_by_vm_mut(vm_id, vm_port) {
                Some((_, entry)) if entry.status() == AssociationStatus::IdleVmPort => {
                    entry.complete_from_dp_side(ct_id, dp_id, dp_port);
                    debug!(vm_id, vm_port, dp_id, dp_port, "dp port completed association");
                }
                _ => {
                    assoc.put(None, Association::idle_dp_port(ct_id, dp_id, dp_port));
                }
            }
        }
    }

    effects
}

/// `VirtualPlaneMap` (§4.5 "On VirtualPlaneMap"). Only an `ASSOCIATED`
/// entry activates; anything else (unknown, already active, still idle)
/// is silently ignored, matching the original's single status check.
pub fn virtual_plane_map(assoc: &mut AssociationTable, vm_id: u64, vm_port: u32, vs_id: u64, vs_port: u32) -> Vec<Effect> {
    let Some((_, entry)) = assoc.find_by_vm_mut(vm_id, vm_port) else {
        warn!(vm_id, vm_port, "virtual plane map for unknown association");
        return Vec::new();
    };
    if entry.status() != AssociationStatus::Associated {
        return Vec::new();
    }

    let ct_id = entry.ct_id.expect("associated implies dp side is set");
    let dp_id = entry.dp_id.expect("associated implies dp side is set");
    let dp_port = entry.dp_port.expect("associated implies dp side is set");
    entry.activate(vs_id, vs_port);

    debug!(vm_id, vm_port, dp_id, vs_id, vs_port, "association active");
    vec![
        Effect::DataPlaneMap { ct_id, dp_id, dp_port, vs_id, vs_port },
        Effect::PortConfig { vm_id, vm_port, operation: PortConfigOp::MapSuccess },
    ]
}

/// `DatapathDown` (§4.5 "On DatapathDown"). Demotes every association and
/// ISL half tied to `(ct_id, dp_id)`, and reports one `PortConfig(RESET)`
/// per client that had a live virtual-side binding.
pub fn datapath_down(assoc: &mut AssociationTable, isltable: &mut IslTable, ct_id: u32, dp_id: u64) -> Vec<Effect> {
    let mut effects = Vec::new();

    for entry in assoc.values_mut() {
        if entry.ct_id != Some(ct_id) || entry.dp_id != Some(dp_id) {
            continue;
        }
        if let (Some(vm_id), Some(vm_port)) = (entry.vm_id, entry.vm_port) {
            effects.push(Effect::PortConfig { vm_id, vm_port, operation: PortConfigOp::Reset });
        }
        entry.demote_to_idle_vm_port();
    }

    for entry in isltable.values_mut() {
        if entry.is_local_side(ct_id, dp_id) {
            entry.ct_id = None;
            entry.dp_id = None;
            entry.dp_port = None;
            entry.eth_addr = None;
        } else if entry.is_remote_side(ct_id, dp_id) {
            entry.rem_ct = None;
            entry.rem_id = None;
            entry.rem_port = None;
            entry.rem_eth_addr = None;
        }
    }

    debug!(dp_id, "datapath down, associations and isl halves demoted");
    effects
}

/// The resolved destination of a client `RouteMod` (§4.5 "On RouteMod
/// received from a client"). Looking this up is the *only* thing that
/// happens before the translator cache is ever touched — see §9 for why
/// that ordering is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteModTarget {
    pub ct_id: u32,
    pub dp_id: u64,
    pub dp_port: u32,
}

pub fn resolve_route_mod_target(assoc: &AssociationTable, vm_id: u64, vm_port: u32) -> Result<RouteModTarget, CoordinatorError> {
    let (_, entry) = assoc
        .find_by_vm(vm_id, vm_port)
        .ok_or(CoordinatorError::UnknownAssociation { vm_id, vm_port })?;
    if entry.status() == AssociationStatus::IdleVmPort {
        return Err(CoordinatorError::UnknownAssociation { vm_id, vm_port });
    }
    Ok(RouteModTarget {
        ct_id: entry.ct_id.expect("not idle_vm_port implies dp side is set"),
        dp_id: entry.dp_id.expect("not idle_vm_port implies dp side is set"),
        dp_port: entry.dp_port.expect("not idle_vm_port implies dp side is set"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::RfConfigEntry;

    fn mac(n: u8) -> MacAddress {
        MacAddress::new([n; 6])
    }

    fn config_with_one_entry() -> RfConfig {
        RfConfig::new(vec![RfConfigEntry { vm_id: 0xa, vm_port: 1, ct_id: 0, dp_id: 0xff, dp_port: 2, fp_label: None }])
    }

    #[test]
    fn unconfigured_vm_port_registers_idle() {
        let mut assoc = AssociationTable::new();
        let config = RfConfig::default();
        register_vm_port(&mut assoc, &config, 0xa, 1, mac(1));
        let (_, entry) = assoc.find_by_vm(0xa, 1).unwrap();
        assert_eq!(entry.status(), AssociationStatus::IdleVmPort);
    }

    #[test]
    fn happy_path_binding_reaches_active() {
        let mut assoc = AssociationTable::new();
        let mut isltable = IslTable::new();
        let config = config_with_one_entry();
        let islconf = RfIslConf::default();

        let effects = register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xff, 2);
        assert_eq!(effects, vec![Effect::ConfigureDatapath { ct_id: 0, dp_id: 0xff }]);

        register_vm_port(&mut assoc, &config, 0xa, 1, mac(0xaa));
        let (_, entry) = assoc.find_by_vm(0xa, 1).unwrap();
        assert_eq!(entry.status(), AssociationStatus::Associated);

        let effects = virtual_plane_map(&mut assoc, 0xa, 1, 0xbb, 7);
        assert_eq!(
            effects,
            vec![
                Effect::DataPlaneMap { ct_id: 0, dp_id: 0xff, dp_port: 2, vs_id: 0xbb, vs_port: 7 },
                Effect::PortConfig { vm_id: 0xa, vm_port: 1, operation: PortConfigOp::MapSuccess },
            ]
        );
        let (_, entry) = assoc.find_by_vm(0xa, 1).unwrap();
        assert_eq!(entry.status(), AssociationStatus::Active);
    }

    #[test]
    fn vm_port_can_arrive_before_dp_port() {
        let mut assoc = AssociationTable::new();
        let mut isltable = IslTable::new();
        let config = config_with_one_entry();
        let islconf = RfIslConf::default();

        register_vm_port(&mut assoc, &config, 0xa, 1, mac(0xaa));
        assert_eq!(assoc.find_by_vm(0xa, 1).unwrap().1.status(), AssociationStatus::IdleVmPort);

        register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xff, 2);
        assert_eq!(assoc.find_by_vm(0xa, 1).unwrap().1.status(), AssociationStatus::Associated);
    }

    #[test]
    fn configure_datapath_only_fires_once_per_datapath() {
        let mut assoc = AssociationTable::new();
        let mut isltable = IslTable::new();
        let config = RfConfig::default();
        let islconf = RfIslConf::default();

        let first = register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xff, 1);
        assert_eq!(first, vec![Effect::ConfigureDatapath { ct_id: 0, dp_id: 0xff }]);

        let second = register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xff, 2);
        assert!(second.is_empty());
    }

    #[test]
    fn virtual_switch_datapath_is_ignored() {
        let mut assoc = AssociationTable::new();
        let mut isltable = IslTable::new();
        let config = RfConfig::default();
        let islconf = RfIslConf::default();

        let effects = register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, RFVS_DPID, 1);
        assert!(effects.is_empty());
        assert!(assoc.values().next().is_none());
    }

    #[test]
    fn isl_pairing_flips_both_halves_active_on_second_registration() {
        let mut assoc = AssociationTable::new();
        let mut isltable = IslTable::new();
        let config = RfConfig::default();
        let islconf = RfIslConf::new(vec![crate::tables::RfIslConfEntry {
            vm_id: 1,
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 1,
            eth_addr: mac(1),
            rem_ct: 0,
            rem_id: 0xb,
            rem_port: 2,
            rem_eth_addr: mac(2),
            fp_master: None,
            fast_paths: Vec::new(),
        }]);

        register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xa, 1);
        let (_, entry) = isltable.find_by_local_eth(&mac(1)).unwrap();
        assert_eq!(entry.status(), IslStatus::IdleDpPort);

        register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xb, 2);
        let (_, entry) = isltable.find_by_local_eth(&mac(1)).unwrap();
        assert_eq!(entry.status(), IslStatus::Active);
        assert_eq!(entry.rem_eth_addr, Some(mac(2)));
    }

    #[test]
    fn datapath_down_resets_only_bound_clients_and_demotes_isl_halves() {
        let mut assoc = AssociationTable::new();
        let mut isltable = IslTable::new();
        let config = config_with_one_entry();
        let islconf = RfIslConf::default();

        register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xff, 2);
        register_vm_port(&mut assoc, &config, 0xa, 1, mac(0xaa));
        virtual_plane_map(&mut assoc, 0xa, 1, 0xbb, 7);

        // An ISL where this datapath is the local side, never completed by a remote.
        let local_id = isltable.put(None, IslEntry::idle_dp_port(1, 0, 0xff, 9, mac(9)));

        // An ISL where this datapath is the remote side of an otherwise-active link:
        // the neighbor (ct=0, dp=0xcc) is local, we're remote.
        let mut neighbor_link = IslEntry::idle_dp_port(1, 0, 0xcc, 4, mac(4));
        neighbor_link.fill_remote(0, 0xff, 10, mac(10));
        let remote_id = isltable.put(None, neighbor_link);

        let effects = datapath_down(&mut assoc, &mut isltable, 0, 0xff);
        assert_eq!(effects, vec![Effect::PortConfig { vm_id: 0xa, vm_port: 1, operation: PortConfigOp::Reset }]);

        let (_, entry) = assoc.find_by_vm(0xa, 1).unwrap();
        assert_eq!(entry.status(), AssociationStatus::IdleVmPort);

        assert_eq!(isltable.get(local_id).unwrap().status(), IslStatus::IdleRemote);
        // Demoted back to idle-dp-port: the neighbor's own local half survives untouched.
        let demoted = isltable.get(remote_id).unwrap();
        assert_eq!(demoted.status(), IslStatus::IdleDpPort);
        assert_eq!(demoted.dp_id, Some(0xcc));
    }

    #[test]
    fn route_mod_target_rejects_unknown_and_idle_associations() {
        let mut assoc = AssociationTable::new();
        assert!(matches!(
            resolve_route_mod_target(&assoc, 0xa, 1),
            Err(CoordinatorError::UnknownAssociation { .. })
        ));

        assoc.put(None, Association::idle_vm_port(0xa, 1, mac(0xaa)));
        assert!(matches!(
            resolve_route_mod_target(&assoc, 0xa, 1),
            Err(CoordinatorError::UnknownAssociation { .. })
        ));
    }

    #[test]
    fn route_mod_target_resolves_once_associated() {
        let mut assoc = AssociationTable::new();
        let mut isltable = IslTable::new();
        let config = config_with_one_entry();
        let islconf = RfIslConf::default();

        register_dp_port(&mut assoc, &mut isltable, &config, &islconf, 0, 0xff, 2);
        register_vm_port(&mut assoc, &config, 0xa, 1, mac(0xaa));

        let target = resolve_route_mod_target(&assoc, 0xa, 1).unwrap();
        assert_eq!(target, RouteModTarget { ct_id: 0, dp_id: 0xff, dp_port: 2 });
    }
}
