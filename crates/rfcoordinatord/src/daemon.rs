//! Coordinator dispatch loop (C8, §4.8): owns every table, the static
//! configs, and the translator cache outright, and turns inbound frames
//! into outbound RouteMods and PortConfig messages.
//!
//! Per §5, the tables and translator cache are touched only from this
//! struct's own methods — there is deliberately no `Arc<Mutex<_>>` around
//! them. The one piece of real concurrency is the datapath queue: RouteMods
//! destined for the proxy cross over an `mpsc` channel to a dedicated
//! worker task that sends them in enqueue order, mirroring the original's
//! `dp_worker` thread plus `ipc_lock`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{info, warn};

use rf_orch_common::SyncMap;
use rf_types::MacAddress;

use crate::assoc::{self, Effect};
use crate::config::StaticConfig;
use crate::ipc::IpcService;
use crate::message::{Channel, Frame, Message, PeerId, PortConfigOp, RouteMod, RouteModOp};
use crate::tables::{AssociationTable, IslTable, RfConfig, RfFpConf, RfIslConf};
use crate::translator::{self, LocalPort, RouteModTranslator, Vendor};

pub struct Coordinator {
    assoc: AssociationTable,
    isltable: IslTable,
    config: RfConfig,
    islconf: RfIslConf,
    fpconf: RfFpConf,
    fastpath_enabled: bool,
    multitabledps: std::collections::HashMap<u64, Vendor>,
    satellitedps: HashSet<u64>,
    /// Never auto-vivifies — a missing datapath id must go through
    /// `translator_for`'s explicit check-then-construct, not silently read
    /// back as a freshly built translator for the wrong vendor.
    translators: SyncMap<u64, Box<dyn RouteModTranslator>>,
    dp_tx: tokio::sync::mpsc::UnboundedSender<Frame>,
    ack_queue: VecDeque<Frame>,
}

impl Coordinator {
    pub fn new(cfg: StaticConfig, dp_tx: tokio::sync::mpsc::UnboundedSender<Frame>) -> Self {
        Coordinator {
            assoc: AssociationTable::new(),
            isltable: IslTable::new(),
            config: cfg.config,
            islconf: cfg.islconf,
            fpconf: cfg.fpconf,
            fastpath_enabled: cfg.fastpath_enabled,
            multitabledps: cfg.multitabledps,
            satellitedps: cfg.satellitedps,
            translators: SyncMap::new(),
            dp_tx,
            ack_queue: VecDeque::new(),
        }
    }

    fn translator_for(&mut self, dp_id: u64) -> &mut Box<dyn RouteModTranslator> {
        if !self.translators.contains_key(&dp_id) {
            let vendor = translator::select_vendor(dp_id, &self.multitabledps, &self.satellitedps);
            self.translators.insert(dp_id, translator::new_translator(vendor));
        }
        self.translators.get_mut(&dp_id).expect("just inserted")
    }

    /// Builds the egress port/VLAN-label pair a controller-route-mod or
    /// forwarding rule should use for `(ct_id, dp_id, dp_port)`. `None`
    /// whenever fastpath is disabled, the port carries no label yet, or no
    /// unique fastpath egress link is declared for this datapath.
    fn local_port(&self, ct_id: u32, dp_id: u64, dp_port: u32, eth_addr: MacAddress) -> LocalPort {
        let fastpath = if self.fastpath_enabled {
            let label = self.config.find_by_dp(ct_id, dp_id, dp_port).and_then(|e| e.fp_label);
            label.and_then(|l| fastpath_egress_port(&self.fpconf, &self.islconf, ct_id, dp_id).map(|p| (p, l)))
        } else {
            None
        };
        LocalPort { dp_port, eth_addr, fastpath }
    }

    /// Every other active local port on `(ct_id, dp_id)` — associations and
    /// ISLs alike — that a forwarding rule should fan out to (§4.7).
    fn other_local_ports(&self, ct_id: u32, dp_id: u64, exclude_dp_port: u32) -> Vec<LocalPort> {
        let mut ports: Vec<LocalPort> = self
            .assoc
            .other_active_ports(ct_id, dp_id, exclude_dp_port)
            .into_iter()
            .filter_map(|a| Some(self.local_port(ct_id, dp_id, a.dp_port?, a.eth_addr?)))
            .collect();
        ports.extend(self.isltable.active_from(ct_id, dp_id).into_iter().filter_map(|isl| {
            let dp_port = isl.dp_port?;
            if dp_port == exclude_dp_port {
                return None;
            }
            Some(self.local_port(ct_id, dp_id, dp_port, isl.eth_addr?))
        }));
        ports
    }

    fn enqueue_for_proxy(&mut self, ct_id: u32, dp_id: u64, mut rm: RouteMod) {
        rm.id = dp_id;
        let frame = Frame::new(PeerId(ct_id as u64), Channel::Proxy, Message::RouteMod(rm.with_ct_id(ct_id)));
        if self.dp_tx.send(frame).is_err() {
            warn!(ct_id, dp_id, "datapath queue worker is gone, dropping route mod");
        }
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) -> Vec<Frame> {
        let mut immediate = Vec::new();
        for effect in effects {
            match effect {
                Effect::ConfigureDatapath { ct_id, dp_id } => {
                    info!(ct_id, dp_id, "configuring datapath");
                    let rules = self.translator_for(dp_id).configure_datapath();
                    for rule in rules {
                        self.enqueue_for_proxy(ct_id, dp_id, rule);
                    }
                }
                Effect::DataPlaneMap { ct_id, dp_id, dp_port, vs_id, vs_port } => {
                    immediate.push(Frame::new(
                        PeerId(ct_id as u64),
                        Channel::Proxy,
                        Message::DataPlaneMap { ct_id, dp_id, dp_port, vs_id, vs_port },
                    ));
                }
                Effect::PortConfig { vm_id, vm_port, operation } => {
                    immediate.push(Frame::new(PeerId(vm_id), Channel::Client, Message::PortConfig { vm_id, vm_port, operation }));
                }
            }
        }
        immediate
    }

    /// `register_route_mod` (§4.5): association lookup happens first and
    /// unconditionally gates translator access (§9 "resolved questions").
    fn dispatch_route_mod(&mut self, rm: RouteMod) {
        let vm_id = rm.id;
        let vm_port = rm.vm_port;
        let target = match assoc::resolve_route_mod_target(&self.assoc, vm_id, vm_port) {
            Ok(target) => target,
            Err(err) => {
                info!(vm_id, vm_port, %err, "dropping route mod for unassociated client port");
                return;
            }
        };
        let eth_addr = self.assoc.find_by_vm(vm_id, vm_port).and_then(|(_, a)| a.eth_addr).unwrap_or(MacAddress::ZERO);
        let egress = self.local_port(target.ct_id, target.dp_id, target.dp_port, eth_addr);

        match rm.operation {
            RouteModOp::Controller => {
                let rules = self.translator_for(target.dp_id).handle_controller_route_mod(&egress, &rm);
                for rule in rules {
                    self.enqueue_for_proxy(target.ct_id, target.dp_id, rule);
                }
            }
            RouteModOp::Add | RouteModOp::Delete => {
                let other_ports = self.other_local_ports(target.ct_id, target.dp_id, target.dp_port);
                let rules = self.translator_for(target.dp_id).handle_route_mod(&egress, &rm, &other_ports);
                for rule in rules {
                    self.enqueue_for_proxy(target.ct_id, target.dp_id, rule);
                }

                let neighbors: Vec<_> = self.isltable.active_to(target.ct_id, target.dp_id).into_iter().cloned().collect();
                for isl in neighbors {
                    let (Some(neighbor_ct), Some(neighbor_dp), Some(neighbor_port)) = (isl.ct_id, isl.dp_id, isl.dp_port) else {
                        continue;
                    };
                    let neighbor_ports = self.other_local_ports(neighbor_ct, neighbor_dp, neighbor_port);
                    let remote_rm = rm.clone();
                    let rules = self.translator_for(neighbor_dp).handle_isl_route_mod(&isl, &remote_rm, &neighbor_ports);
                    for rule in rules {
                        self.enqueue_for_proxy(neighbor_ct, neighbor_dp, rule);
                    }
                }
            }
            other => warn!(?other, vm_id, vm_port, "received route mod with unhandled operation"),
        }

        self.ack_queue.push_back(Frame::new(
            PeerId(vm_id),
            Channel::Client,
            Message::PortConfig { vm_id, vm_port, operation: PortConfigOp::RouteModAck },
        ));
    }

    /// Client-channel dispatch (§4.8): `PORT_REGISTER` → C5, `ROUTE_MOD` →
    /// translate-and-enqueue (the ack is queued, not returned here — it is
    /// drained only once the proxy signals it is ready for more).
    pub fn handle_client_message(&mut self, msg: Message) -> Vec<Frame> {
        match msg {
            Message::PortRegister { vm_id, vm_port, hwaddress } => {
                assoc::register_vm_port(&mut self.assoc, &self.config, vm_id, vm_port, hwaddress);
                Vec::new()
            }
            Message::RouteMod(rm) => {
                self.dispatch_route_mod(rm);
                Vec::new()
            }
            other => {
                warn!(?other, "unexpected message on client channel");
                Vec::new()
            }
        }
    }

    /// Proxy-channel dispatch (§4.8): registration/teardown/map messages go
    /// to C5; an inbound `ROUTE_MOD` is the proxy's readiness signal and
    /// triggers draining the ack queue (proxy-paced acknowledgement, §5).
    pub fn handle_proxy_message(&mut self, msg: Message) -> Vec<Frame> {
        match msg {
            Message::DatapathPortRegister { ct_id, dp_id, dp_port } => {
                let effects = assoc::register_dp_port(&mut self.assoc, &mut self.isltable, &self.config, &self.islconf, ct_id, dp_id, dp_port);
                self.apply_effects(effects)
            }
            Message::DatapathDown { ct_id, dp_id } => {
                let effects = assoc::datapath_down(&mut self.assoc, &mut self.isltable, ct_id, dp_id);
                self.apply_effects(effects)
            }
            Message::VirtualPlaneMap { vm_id, vm_port, vs_id, vs_port } => {
                let effects = assoc::virtual_plane_map(&mut self.assoc, vm_id, vm_port, vs_id, vs_port);
                self.apply_effects(effects)
            }
            Message::RouteMod(_) => self.ack_queue.drain(..).collect(),
            other => {
                warn!(?other, "unexpected message on proxy channel");
                Vec::new()
            }
        }
    }
}

/// Mirrors `_get_fastpath_port` (the original's per-translator helper): the
/// single fastpath/ISL link touching this datapath whose `fp_master` names
/// some *other* datapath — the direction "up" the tree towards the
/// controller. `None` when zero or more than one such link exists.
fn fastpath_egress_port(fpconf: &RfFpConf, islconf: &RfIslConf, ct_id: u32, dp_id: u64) -> Option<u32> {
    let mut candidates = Vec::new();
    for fp in fpconf.iter().filter(|e| e.ct_id == ct_id && e.dp_id == dp_id) {
        if fp.fp_master.is_some_and(|m| m != dp_id) {
            candidates.push(fp.dp_port);
        }
    }
    for isl in islconf.iter() {
        let local = isl.ct_id == ct_id && isl.dp_id == dp_id;
        let remote = isl.rem_ct == ct_id && isl.rem_id == dp_id;
        if !local && !remote {
            continue;
        }
        if isl.fp_master.is_some_and(|m| m != dp_id) {
            candidates.push(if local { isl.dp_port } else { isl.rem_port });
        }
    }
    match candidates.as_slice() {
        [single] => Some(*single),
        _ => None,
    }
}

/// Drains the datapath queue and sends each frame through the IPC service,
/// in enqueue order, one at a time (§4.8 "dp_worker", §5 "RouteMods
/// enqueued for one datapath are sent in enqueue order").
async fn run_dp_worker(ipc: Arc<IpcService>, mut dp_rx: tokio::sync::mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = dp_rx.recv().await {
        if let Err(err) = ipc.send(frame).await {
            warn!(%err, "dropping datapath frame after retry exhaustion");
        }
    }
}

/// The top-level run loop: subscribes to the IPC fabric's internal bus,
/// dispatches every inbound frame by channel, and sends whatever frames
/// fall out of that dispatch immediately. Spawns the dedicated datapath
/// worker task described in §4.8.
pub async fn run(mut coordinator: Coordinator, ipc: Arc<IpcService>, dp_rx: tokio::sync::mpsc::UnboundedReceiver<Frame>) {
    let dp_worker = tokio::spawn(run_dp_worker(ipc.clone(), dp_rx));
    let mut inbound = ipc.subscribe();
    while let Ok(frame) = inbound.recv().await {
        let outgoing = match frame.channel {
            Channel::Client => coordinator.handle_client_message(frame.message),
            Channel::Proxy => coordinator.handle_proxy_message(frame.message),
        };
        for frame in outgoing {
            if let Err(err) = ipc.send(frame).await {
                warn!(%err, "dropping frame after retry exhaustion");
            }
        }
    }
    dp_worker.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Match;
    use crate::ipc::LoopbackTransport;
    use crate::tables::RfConfigEntry;

    fn mac(n: u8) -> MacAddress {
        MacAddress::new([n; 6])
    }

    fn empty_config() -> StaticConfig {
        StaticConfig {
            config: RfConfig::default(),
            islconf: RfIslConf::default(),
            fpconf: RfFpConf::default(),
            multitabledps: std::collections::HashMap::new(),
            satellitedps: HashSet::new(),
            fastpath_enabled: false,
        }
    }

    fn new_coordinator(cfg: StaticConfig) -> (Coordinator, tokio::sync::mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Coordinator::new(cfg, tx), rx)
    }

    #[tokio::test]
    async fn happy_path_binding_reaches_active_and_maps_the_data_plane() {
        let mut cfg = empty_config();
        cfg.config = RfConfig::new(vec![RfConfigEntry { vm_id: 0xa, vm_port: 1, ct_id: 0, dp_id: 0xff, dp_port: 2, fp_label: None }]);
        let (mut coord, mut dp_rx) = new_coordinator(cfg);

        let out1 = coord.handle_proxy_message(Message::DatapathPortRegister { ct_id: 0, dp_id: 0xff, dp_port: 2 });
        assert!(out1.is_empty());
        // configure_datapath's rules went to the dp queue, not returned immediately.
        assert!(dp_rx.try_recv().is_ok());

        let out2 = coord.handle_client_message(Message::PortRegister { vm_id: 0xa, vm_port: 1, hwaddress: mac(0xaa) });
        assert!(out2.is_empty());

        let out3 = coord.handle_proxy_message(Message::VirtualPlaneMap { vm_id: 0xa, vm_port: 1, vs_id: 0xbb, vs_port: 7 });
        assert_eq!(out3.len(), 2);
        assert!(matches!(out3[0].message, Message::DataPlaneMap { ct_id: 0, dp_id: 0xff, dp_port: 2, vs_id: 0xbb, vs_port: 7 }));
        assert!(matches!(
            out3[1].message,
            Message::PortConfig { vm_id: 0xa, vm_port: 1, operation: PortConfigOp::MapSuccess }
        ));
    }

    #[tokio::test]
    async fn route_mod_from_unknown_association_is_dropped_without_touching_translators() {
        let (mut coord, mut dp_rx) = new_coordinator(empty_config());
        coord.handle_client_message(Message::RouteMod(RouteMod::new(RouteModOp::Add, 0xa, 1)));
        assert!(coord.translators.is_empty());
        assert!(dp_rx.try_recv().is_err());
        assert!(coord.ack_queue.is_empty());
    }

    #[tokio::test]
    async fn route_mod_with_no_fan_out_still_queues_exactly_one_ack() {
        let mut cfg = empty_config();
        cfg.config = RfConfig::new(vec![RfConfigEntry { vm_id: 0xa, vm_port: 1, ct_id: 0, dp_id: 0xff, dp_port: 2, fp_label: None }]);
        let (mut coord, mut dp_rx) = new_coordinator(cfg);

        coord.handle_proxy_message(Message::DatapathPortRegister { ct_id: 0, dp_id: 0xff, dp_port: 2 });
        coord.handle_client_message(Message::PortRegister { vm_id: 0xa, vm_port: 1, hwaddress: mac(0xaa) });
        while dp_rx.try_recv().is_ok() {} // drain configure_datapath rules

        let mut rm = RouteMod::new(RouteModOp::Add, 0xa, 1);
        rm.matches.push(Match::EtherType(0x0800));
        coord.handle_client_message(Message::RouteMod(rm));

        assert!(dp_rx.try_recv().is_err()); // no other active ports to fan out to
        let acks = coord.handle_proxy_message(Message::RouteMod(RouteMod::new(RouteModOp::Add, 0, 0)));
        assert_eq!(acks.len(), 1);
        assert!(matches!(acks[0].message, Message::PortConfig { operation: PortConfigOp::RouteModAck, .. }));
    }

    #[tokio::test]
    async fn datapath_down_resets_bound_clients() {
        let mut cfg = empty_config();
        cfg.config = RfConfig::new(vec![RfConfigEntry { vm_id: 0xa, vm_port: 1, ct_id: 0, dp_id: 0xff, dp_port: 2, fp_label: None }]);
        let (mut coord, _dp_rx) = new_coordinator(cfg);

        coord.handle_proxy_message(Message::DatapathPortRegister { ct_id: 0, dp_id: 0xff, dp_port: 2 });
        coord.handle_client_message(Message::PortRegister { vm_id: 0xa, vm_port: 1, hwaddress: mac(0xaa) });

        let out = coord.handle_proxy_message(Message::DatapathDown { ct_id: 0, dp_id: 0xff });
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0].message,
            Message::PortConfig { vm_id: 0xa, vm_port: 1, operation: PortConfigOp::Reset }
        ));
    }

    #[tokio::test]
    async fn run_loop_drives_ipc_send_for_effect_frames() {
        let (transport, mut delivered) = LoopbackTransport::new();
        let (ipc, worker) = IpcService::new(Arc::new(transport), true);
        let ipc = Arc::new(ipc);
        tokio::spawn(worker);

        let mut cfg = empty_config();
        cfg.fpconf = RfFpConf::new(vec![]);
        let (dp_tx, dp_rx) = tokio::sync::mpsc::unbounded_channel();
        let coordinator = Coordinator::new(cfg, dp_tx);
        let ipc_for_run = ipc.clone();
        let run_handle = tokio::spawn(async move { run(coordinator, ipc_for_run, dp_rx).await });

        ipc.deliver_inbound(Frame::new(PeerId(0), Channel::Proxy, Message::DatapathPortRegister { ct_id: 0, dp_id: 0xaa, dp_port: 1 }));
        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), delivered.recv()).await;
        assert!(frame.unwrap().is_some());

        run_handle.abort();
    }
}
