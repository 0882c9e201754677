//! The association table: the binding between a virtual-side endpoint and a
//! datapath-side endpoint (§3 "Association entry").

use rf_types::MacAddress;

use super::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationStatus {
    IdleVmPort,
    IdleDpPort,
    Associated,
    Active,
}

/// Status is never stored — it is always recomputed from field occupancy
/// (§3) so it can never drift out of sync with the fields themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Association {
    pub vm_id: std::option::Option<u64>,
    pub vm_port: std::option::Option<u32>,
    pub eth_addr: std::option::Option<MacAddress>,
    pub ct_id: std::option::Option<u32>,
    pub dp_id: std::option::Option<u64>,
    pub dp_port: std::option::Option<u32>,
    pub vs_id: std::option::Option<u64>,
    pub vs_port: std::option::Option<u32>,
    pub fp_label: std::option::Option<u16>,
}

impl Association {
    pub fn idle_vm_port(vm_id: u64, vm_port: u32, eth_addr: MacAddress) -> Self {
        Association {
            vm_id: Some(vm_id),
            vm_port: Some(vm_port),
            eth_addr: Some(eth_addr),
            ..Default::default()
        }
    }

    pub fn idle_dp_port(ct_id: u32, dp_id: u64, dp_port: u32) -> Self {
        Association {
            ct_id: Some(ct_id),
            dp_id: Some(dp_id),
            dp_port: Some(dp_port),
            ..Default::default()
        }
    }

    fn has_vm_side(&self) -> bool {
        self.vm_id.is_some() && self.vm_port.is_some()
    }

    fn has_dp_side(&self) -> bool {
        self.ct_id.is_some() && self.dp_id.is_some() && self.dp_port.is_some()
    }

    fn has_vs_side(&self) -> bool {
        self.vs_id.is_some() && self.vs_port.is_some()
    }

    pub fn status(&self) -> AssociationStatus {
        match (self.has_vm_side(), self.has_dp_side(), self.has_vs_side()) {
            (true, true, true) => AssociationStatus::Active,
            (true, true, false) => AssociationStatus::Associated,
            (true, false, _) => AssociationStatus::IdleVmPort,
            (false, _, _) => AssociationStatus::IdleDpPort,
        }
    }

    /// Completes an `IDLE_DP_PORT` half with the virtual-side fields that
    /// just registered → `ASSOCIATED` (§4.5 step 2).
    pub fn complete_from_vm_side(&mut self, vm_id: u64, vm_port: u32, eth_addr: MacAddress) {
        self.vm_id = Some(vm_id);
        self.vm_port = Some(vm_port);
        self.eth_addr = Some(eth_addr);
    }

    /// Completes an `IDLE_VM_PORT` half with the datapath-side fields that
    /// just registered → `ASSOCIATED` (§4.5 step 4).
    pub fn complete_from_dp_side(&mut self, ct_id: u32, dp_id: u64, dp_port: u32) {
        self.ct_id = Some(ct_id);
        self.dp_id = Some(dp_id);
        self.dp_port = Some(dp_port);
    }

    /// `ASSOCIATED` → `ACTIVE` once the virtual plane map arrives (§4.5).
    pub fn activate(&mut self, vs_id: u64, vs_port: u32) {
        self.vs_id = Some(vs_id);
        self.vs_port = Some(vs_port);
    }

    /// Datapath-down demotion: drops the datapath and virtual-switch sides,
    /// keeps the virtual side for reuse (§3, §4.5).
    pub fn demote_to_idle_vm_port(&mut self) {
        self.ct_id = None;
        self.dp_id = None;
        self.dp_port = None;
        self.vs_id = None;
        self.vs_port = None;
    }
}

pub type AssociationTable = Store<Association>;

impl AssociationTable {
    pub fn find_by_vm(&self, vm_id: u64, vm_port: u32) -> std::option::Option<(u64, &Association)> {
        self.find_one(|a| a.vm_id == Some(vm_id) && a.vm_port == Some(vm_port))
    }

    pub fn find_by_dp(&self, ct_id: u32, dp_id: u64, dp_port: u32) -> std::option::Option<(u64, &Association)> {
        self.find_one(|a| a.ct_id == Some(ct_id) && a.dp_id == Some(dp_id) && a.dp_port == Some(dp_port))
    }

    pub fn find_by_dp_mut(&mut self, ct_id: u32, dp_id: u64, dp_port: u32) -> std::option::Option<(u64, &mut Association)> {
        self.find_one_mut(|a| a.ct_id == Some(ct_id) && a.dp_id == Some(dp_id) && a.dp_port == Some(dp_port))
    }

    pub fn find_by_vm_mut(&mut self, vm_id: u64, vm_port: u32) -> std::option::Option<(u64, &mut Association)> {
        self.find_one_mut(|a| a.vm_id == Some(vm_id) && a.vm_port == Some(vm_port))
    }

    /// All associations bound to a given datapath, any status.
    pub fn on_datapath(&self, ct_id: u32, dp_id: u64) -> Vec<(u64, &Association)> {
        self.find(|a| a.ct_id == Some(ct_id) && a.dp_id == Some(dp_id))
    }

    /// Every `ACTIVE`/`ASSOCIATED` port on a datapath other than `exclude_dp_port`
    /// — the fan-out set `handle_route_mod` (§4.7) sends copies to.
    pub fn other_active_ports(&self, ct_id: u32, dp_id: u64, exclude_dp_port: u32) -> Vec<&Association> {
        self.values()
            .filter(|a| {
                a.ct_id == Some(ct_id)
                    && a.dp_id == Some(dp_id)
                    && a.dp_port != Some(exclude_dp_port)
                    && matches!(a.status(), AssociationStatus::Associated | AssociationStatus::Active)
            })
            .collect()
    }

    /// True if this is the first port registered from `(ct_id, dp_id)` in
    /// either table — signals that `configure_datapath()` must run (§4.5
    /// step 2). The ISL table is checked by the caller too.
    pub fn has_any_entry_for(&self, ct_id: u32, dp_id: u64) -> bool {
        self.values().any(|a| a.ct_id == Some(ct_id) && a.dp_id == Some(dp_id))
    }
}
