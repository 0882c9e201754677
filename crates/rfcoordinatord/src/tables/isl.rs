//! The ISL table: one entry per directed half of an inter-switch link
//! (§3 "ISL entry").

use rf_types::MacAddress;

use super::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslStatus {
    IdleDpPort,
    IdleRemote,
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IslEntry {
    pub vm_id: u64,
    pub ct_id: std::option::Option<u32>,
    pub dp_id: std::option::Option<u64>,
    pub dp_port: std::option::Option<u32>,
    pub eth_addr: std::option::Option<MacAddress>,
    pub rem_ct: std::option::Option<u32>,
    pub rem_id: std::option::Option<u64>,
    pub rem_port: std::option::Option<u32>,
    pub rem_eth_addr: std::option::Option<MacAddress>,
}

impl IslEntry {
    pub fn idle_dp_port(vm_id: u64, ct_id: u32, dp_id: u64, dp_port: u32, eth_addr: MacAddress) -> Self {
        IslEntry {
            vm_id,
            ct_id: Some(ct_id),
            dp_id: Some(dp_id),
            dp_port: Some(dp_port),
            eth_addr: Some(eth_addr),
            ..Default::default()
        }
    }

    pub fn idle_remote(vm_id: u64, rem_ct: u32, rem_id: u64, rem_port: u32, rem_eth_addr: MacAddress) -> Self {
        IslEntry {
            vm_id,
            rem_ct: Some(rem_ct),
            rem_id: Some(rem_id),
            rem_port: Some(rem_port),
            rem_eth_addr: Some(rem_eth_addr),
            ..Default::default()
        }
    }

    fn has_local(&self) -> bool {
        self.ct_id.is_some() && self.dp_id.is_some() && self.dp_port.is_some()
    }

    fn has_remote(&self) -> bool {
        self.rem_ct.is_some() && self.rem_id.is_some() && self.rem_port.is_some()
    }

    pub fn status(&self) -> IslStatus {
        match (self.has_local(), self.has_remote()) {
            (true, true) => IslStatus::Active,
            (true, false) => IslStatus::IdleDpPort,
            (false, _) => IslStatus::IdleRemote,
        }
    }

    pub fn fill_remote(&mut self, rem_ct: u32, rem_id: u64, rem_port: u32, rem_eth_addr: MacAddress) {
        self.rem_ct = Some(rem_ct);
        self.rem_id = Some(rem_id);
        self.rem_port = Some(rem_port);
        self.rem_eth_addr = Some(rem_eth_addr);
    }

    pub fn fill_local(&mut self, ct_id: u32, dp_id: u64, dp_port: u32, eth_addr: MacAddress) {
        self.ct_id = Some(ct_id);
        self.dp_id = Some(dp_id);
        self.dp_port = Some(dp_port);
        self.eth_addr = Some(eth_addr);
    }

    /// `true` if `(ct_id, dp_id)` is the local side of this half.
    pub fn is_local_side(&self, ct_id: u32, dp_id: u64) -> bool {
        self.ct_id == Some(ct_id) && self.dp_id == Some(dp_id)
    }

    /// `true` if `(ct_id, dp_id)` is the remote side of this half.
    pub fn is_remote_side(&self, ct_id: u32, dp_id: u64) -> bool {
        self.rem_ct == Some(ct_id) && self.rem_id == Some(dp_id)
    }
}

pub type IslTable = Store<IslEntry>;

impl IslTable {
    pub fn find_by_remote_eth(&self, eth: &MacAddress) -> std::option::Option<(u64, &IslEntry)> {
        self.find_one(|e| e.rem_eth_addr.as_ref() == Some(eth))
    }

    pub fn find_by_local_eth(&self, eth: &MacAddress) -> std::option::Option<(u64, &IslEntry)> {
        self.find_one(|e| e.eth_addr.as_ref() == Some(eth))
    }

    pub fn on_datapath(&self, ct_id: u32, dp_id: u64) -> Vec<(u64, &IslEntry)> {
        self.find(|e| e.is_local_side(ct_id, dp_id) || e.is_remote_side(ct_id, dp_id))
    }

    /// Every active ISL reachable from `(ct_id, dp_id)`, local side first.
    pub fn active_from(&self, ct_id: u32, dp_id: u64) -> Vec<&IslEntry> {
        self.values()
            .filter(|e| e.is_local_side(ct_id, dp_id) && e.status() == IslStatus::Active)
            .collect()
    }

    /// Every active ISL for which `(ct_id, dp_id)` is the *remote* side —
    /// the neighbors that must be told how to reach this datapath
    /// (§4.5 "RouteMod received from a client": fan-out runs on the
    /// neighbor's own translator, keyed by the neighbor's local half).
    pub fn active_to(&self, ct_id: u32, dp_id: u64) -> Vec<&IslEntry> {
        self.values()
            .filter(|e| e.is_remote_side(ct_id, dp_id) && e.status() == IslStatus::Active)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_flips_both_halves_to_active() {
        let mut table = IslTable::new();
        let eth_a = MacAddress::new([1; 6]);
        let eth_b = MacAddress::new([2; 6]);

        let id = table.put(None, IslEntry::idle_dp_port(1, 0, 0xa, 1, eth_a));
        assert_eq!(table.get(id).unwrap().status(), IslStatus::IdleDpPort);

        let (_, entry) = table.find_by_local_eth(&eth_a).unwrap();
        assert_eq!(entry.status(), IslStatus::IdleDpPort);

        table.get_mut(id).unwrap().fill_remote(1, 0xb, 2, eth_b);
        assert_eq!(table.get(id).unwrap().status(), IslStatus::Active);
    }
}
