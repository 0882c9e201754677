//! Static configuration tables (§3): loaded once at startup from CSV,
//! read-only thereafter. Fastpath annotations (`fp_label`, `fp_master`,
//! `fast_paths`) are computed later by the allocator (§4.6) and attached in
//! place onto these same entries.

use rf_types::MacAddress;

/// The intended wiring: `(vm_id, vm_port) ↔ (ct_id, dp_id, dp_port)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RfConfigEntry {
    pub vm_id: u64,
    pub vm_port: u32,
    pub ct_id: u32,
    pub dp_id: u64,
    pub dp_port: u32,
    pub fp_label: std::option::Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct RfConfig {
    entries: Vec<RfConfigEntry>,
}

impl RfConfig {
    pub fn new(entries: Vec<RfConfigEntry>) -> Self {
        RfConfig { entries }
    }

    pub fn find_by_vm(&self, vm_id: u64, vm_port: u32) -> std::option::Option<&RfConfigEntry> {
        self.entries.iter().find(|e| e.vm_id == vm_id && e.vm_port == vm_port)
    }

    pub fn find_by_dp(&self, ct_id: u32, dp_id: u64, dp_port: u32) -> std::option::Option<&RfConfigEntry> {
        self.entries
            .iter()
            .find(|e| e.ct_id == ct_id && e.dp_id == dp_id && e.dp_port == dp_port)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RfConfigEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RfConfigEntry> {
        self.entries.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every virtual port directly attached to a datapath — what the
    /// fastpath allocator's wave step walks (§4.6).
    pub fn ports_on_datapath(&self, dp_id: u64) -> Vec<&RfConfigEntry> {
        self.entries.iter().filter(|e| e.dp_id == dp_id).collect()
    }

    pub fn ports_on_datapath_mut(&mut self, dp_id: u64) -> Vec<&mut RfConfigEntry> {
        self.entries.iter_mut().filter(|e| e.dp_id == dp_id).collect()
    }
}

/// Which side of a configured ISL a given `(ct_id, dp_id, dp_port)` plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslSide {
    Local,
    Remote,
}

/// One declared inter-switch link (§3 "RFISLConf").
#[derive(Debug, Clone, PartialEq)]
pub struct RfIslConfEntry {
    pub vm_id: u64,
    pub ct_id: u32,
    pub dp_id: u64,
    pub dp_port: u32,
    pub eth_addr: MacAddress,
    pub rem_ct: u32,
    pub rem_id: u64,
    pub rem_port: u32,
    pub rem_eth_addr: MacAddress,
    pub fp_master: std::option::Option<u64>,
    pub fast_paths: Vec<(u16, u32)>,
}

impl RfIslConfEntry {
    /// Which side `(ct_id, dp_id, dp_port)` plays, if any, and the
    /// "other side" Ethernet address to search the live ISL table with
    /// (§4.5 "ISL registration").
    pub fn side_for(&self, ct_id: u32, dp_id: u64, dp_port: u32) -> std::option::Option<(IslSide, MacAddress)> {
        if self.ct_id == ct_id && self.dp_id == dp_id && self.dp_port == dp_port {
            Some((IslSide::Local, self.rem_eth_addr))
        } else if self.rem_ct == ct_id && self.rem_id == dp_id && self.rem_port == dp_port {
            Some((IslSide::Remote, self.eth_addr))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RfIslConf {
    entries: Vec<RfIslConfEntry>,
}

impl RfIslConf {
    pub fn new(entries: Vec<RfIslConfEntry>) -> Self {
        RfIslConf { entries }
    }

    /// Every declared ISL whose local or remote endpoint is this port.
    pub fn matching(&self, ct_id: u32, dp_id: u64, dp_port: u32) -> Vec<&RfIslConfEntry> {
        self.entries
            .iter()
            .filter(|e| e.side_for(ct_id, dp_id, dp_port).is_some())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RfIslConfEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RfIslConfEntry> {
        self.entries.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[RfIslConfEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<RfIslConfEntry> {
        &mut self.entries
    }
}

/// A declared fastpath link to the controller (§3 "RFFPConf").
#[derive(Debug, Clone, PartialEq)]
pub struct RfFpConfEntry {
    pub ct_id: u32,
    pub dp_id: u64,
    pub dp_port: u32,
    pub dp0_port: u32,
    pub fp_master: std::option::Option<u64>,
    pub fast_paths: Vec<(u16, u32)>,
}

#[derive(Debug, Clone, Default)]
pub struct RfFpConf {
    entries: Vec<RfFpConfEntry>,
}

impl RfFpConf {
    pub fn new(entries: Vec<RfFpConfEntry>) -> Self {
        RfFpConf { entries }
    }

    /// Fastpath is enabled iff this table is non-empty (§9 "resolved
    /// questions": the canonical enablement rule).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RfFpConfEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RfFpConfEntry> {
        self.entries.iter_mut()
    }

    pub(crate) fn entries(&self) -> &[RfFpConfEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<RfFpConfEntry> {
        &mut self.entries
    }
}

/// Common surface the fastpath allocator (§4.6) mutates whether the link
/// it's looking at is a seed `RFFPConfEntry` or an inner-wave `RFISLConfEntry`.
pub trait FastpathLink {
    fn fp_master(&self) -> std::option::Option<u64>;
    fn set_fp_master(&mut self, value: std::option::Option<u64>);
    fn fast_paths(&self) -> &[(u16, u32)];
    fn fast_paths_mut(&mut self) -> &mut Vec<(u16, u32)>;
}

impl FastpathLink for RfFpConfEntry {
    fn fp_master(&self) -> std::option::Option<u64> {
        self.fp_master
    }
    fn set_fp_master(&mut self, value: std::option::Option<u64>) {
        self.fp_master = value;
    }
    fn fast_paths(&self) -> &[(u16, u32)] {
        &self.fast_paths
    }
    fn fast_paths_mut(&mut self) -> &mut Vec<(u16, u32)> {
        &mut self.fast_paths
    }
}

impl FastpathLink for RfIslConfEntry {
    fn fp_master(&self) -> std::option::Option<u64> {
        self.fp_master
    }
    fn set_fp_master(&mut self, value: std::option::Option<u64>) {
        self.fp_master = value;
    }
    fn fast_paths(&self) -> &[(u16, u32)] {
        &self.fast_paths
    }
    fn fast_paths_mut(&mut self) -> &mut Vec<(u16, u32)> {
        &mut self.fast_paths
    }
}
