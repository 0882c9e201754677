//! Fastpath label allocation (C6, §4.6): a BFS flood out from every
//! controller-facing link, handing out VLAN labels to directly attached
//! virtual ports wave by wave and pulling each wave's assignments back onto
//! the link that discovered it.
//!
//! Each datapath is claimed by exactly one wave: the first frontier to
//! discover it marks it visited before any other path can reach it, which
//! is what makes the allocation deterministic (first writer wins) rather
//! than dependent on queue scheduling order.
//!
//! Fastpath is enabled at all only when the `RFFPConf` table is non-empty
//! (§9); callers are expected to check that before calling [`FastpathAllocator::compute`].

use std::collections::{HashSet, VecDeque};

use crate::error::CoordinatorError;
use crate::tables::{FastpathLink, RfConfig, RfFpConf, RfIslConf};

/// First label handed out. Labels below this are reserved (§4.6).
const FIRST_LABEL: u16 = 2;
/// One past the last label available; allocation fails at this point.
const LABEL_LIMIT: u16 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKey {
    Fp(usize),
    Isl(usize),
}

struct Frontier {
    parent: std::option::Option<u64>,
    link: LinkKey,
}

/// Hands out VLAN labels in the range `2..2048`, first writer wins.
#[derive(Debug, Clone)]
pub struct FastpathAllocator {
    next_label: u16,
}

impl Default for FastpathAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FastpathAllocator {
    pub fn new() -> Self {
        FastpathAllocator { next_label: FIRST_LABEL }
    }

    fn allocate_label(&mut self) -> Result<u16, CoordinatorError> {
        if self.next_label >= LABEL_LIMIT {
            return Err(CoordinatorError::LabelExhausted);
        }
        let label = self.next_label;
        self.next_label += 1;
        Ok(label)
    }

    /// Recomputes fastpath labels and master assignments over the whole
    /// topology. Idempotent on ports that already carry a label: those are
    /// never reassigned, only ever treated as evidence that some other wave
    /// has already claimed that datapath.
    pub fn compute(
        &mut self,
        fpconf: &mut RfFpConf,
        islconf: &mut RfIslConf,
        config: &mut RfConfig,
    ) -> Result<(), CoordinatorError> {
        let mut visited: HashSet<u64> = HashSet::new();
        let mut queue: VecDeque<Frontier> = VecDeque::new();
        for i in 0..fpconf.entries().len() {
            queue.push_back(Frontier { parent: None, link: LinkKey::Fp(i) });
        }

        // (child, parent) in discovery order, so that pulling assignments
        // back up in reverse always visits a child before its own parent.
        let mut edges: Vec<(LinkKey, LinkKey)> = Vec::new();

        while let Some(Frontier { parent, link }) = queue.pop_front() {
            let my_side = match link {
                LinkKey::Fp(i) => fpconf.entries()[i].dp_id,
                LinkKey::Isl(i) => {
                    let entry = &islconf.entries()[i];
                    if Some(entry.dp_id) == parent {
                        entry.rem_id
                    } else {
                        entry.dp_id
                    }
                }
            };

            // A declared root's own dp_id is only reserved here, at the point
            // it is actually processed, rather than up front for every root —
            // otherwise two roots joined by a shared ISL would each find the
            // other pre-claimed and neither wave could ever cross it. An ISL
            // frontier's target side was already reserved when the edge was
            // discovered, so it never needs (or should get) this check again.
            if let LinkKey::Fp(_) = link {
                if !visited.insert(my_side) {
                    continue;
                }
            }

            let already_labeled = config.ports_on_datapath(my_side).iter().any(|p| p.fp_label.is_some());
            if already_labeled {
                set_fp_master(fpconf, islconf, link, None);
                continue;
            }

            let mut assigned = Vec::new();
            for port in config.ports_on_datapath_mut(my_side) {
                if port.fp_label.is_none() {
                    let label = self.allocate_label()?;
                    port.fp_label = Some(label);
                    assigned.push((label, port.vm_port));
                }
            }
            fast_paths_mut(fpconf, islconf, link).extend(assigned);
            set_fp_master(fpconf, islconf, link, Some(parent.unwrap_or(my_side)));

            for j in 0..islconf.entries().len() {
                if let LinkKey::Isl(cur) = link {
                    if cur == j {
                        continue;
                    }
                }
                let (local_dp, remote_dp) = {
                    let entry = &islconf.entries()[j];
                    (entry.dp_id, entry.rem_id)
                };
                let next_side = if local_dp == my_side {
                    Some(remote_dp)
                } else if remote_dp == my_side {
                    Some(local_dp)
                } else {
                    None
                };
                let Some(next_side) = next_side else { continue };
                if !visited.insert(next_side) {
                    continue;
                }
                islconf.entries_mut()[j].fast_paths.clear();
                let child = LinkKey::Isl(j);
                edges.push((child, link));
                queue.push_back(Frontier { parent: Some(my_side), link: child });
            }
        }

        for (child, parent) in edges.into_iter().rev() {
            let pulled = fast_paths(fpconf, islconf, child).to_vec();
            fast_paths_mut(fpconf, islconf, parent).extend(pulled);
        }

        Ok(())
    }
}

fn fast_paths<'a>(fpconf: &'a RfFpConf, islconf: &'a RfIslConf, key: LinkKey) -> &'a [(u16, u32)] {
    match key {
        LinkKey::Fp(i) => fpconf.entries()[i].fast_paths(),
        LinkKey::Isl(i) => islconf.entries()[i].fast_paths(),
    }
}

fn fast_paths_mut<'a>(fpconf: &'a mut RfFpConf, islconf: &'a mut RfIslConf, key: LinkKey) -> &'a mut Vec<(u16, u32)> {
    match key {
        LinkKey::Fp(i) => fpconf.entries_mut()[i].fast_paths_mut(),
        LinkKey::Isl(i) => islconf.entries_mut()[i].fast_paths_mut(),
    }
}

fn set_fp_master(fpconf: &mut RfFpConf, islconf: &mut RfIslConf, key: LinkKey, value: std::option::Option<u64>) {
    match key {
        LinkKey::Fp(i) => fpconf.entries_mut()[i].set_fp_master(value),
        LinkKey::Isl(i) => islconf.entries_mut()[i].set_fp_master(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{RfConfigEntry, RfFpConfEntry, RfIslConfEntry};
    use rf_types::MacAddress;

    fn mac(n: u8) -> MacAddress {
        MacAddress::new([n; 6])
    }

    #[test]
    fn leaf_becomes_its_own_master() {
        let mut fpconf = RfFpConf::new(vec![RfFpConfEntry {
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 1,
            dp0_port: 0,
            fp_master: None,
            fast_paths: Vec::new(),
        }]);
        let mut islconf = RfIslConf::new(vec![]);
        let mut config = RfConfig::new(vec![RfConfigEntry {
            vm_id: 1,
            vm_port: 1,
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 2,
            fp_label: None,
        }]);

        let mut alloc = FastpathAllocator::new();
        alloc.compute(&mut fpconf, &mut islconf, &mut config).unwrap();

        let entry = &fpconf.entries()[0];
        assert_eq!(entry.fp_master, Some(0xa));
        assert_eq!(entry.fast_paths, vec![(2, 1)]);
        assert_eq!(config.find_by_vm(1, 1).unwrap().fp_label, Some(2));
    }

    #[test]
    fn wave_propagates_across_an_isl_and_pulls_labels_up() {
        let mut fpconf = RfFpConf::new(vec![RfFpConfEntry {
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 1,
            dp0_port: 0,
            fp_master: None,
            fast_paths: Vec::new(),
        }]);
        let mut islconf = RfIslConf::new(vec![RfIslConfEntry {
            vm_id: 1,
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 3,
            eth_addr: mac(1),
            rem_ct: 0,
            rem_id: 0xb,
            rem_port: 4,
            rem_eth_addr: mac(2),
            fp_master: None,
            fast_paths: Vec::new(),
        }]);
        let mut config = RfConfig::new(vec![RfConfigEntry {
            vm_id: 2,
            vm_port: 1,
            ct_id: 0,
            dp_id: 0xb,
            dp_port: 5,
            fp_label: None,
        }]);

        let mut alloc = FastpathAllocator::new();
        alloc.compute(&mut fpconf, &mut islconf, &mut config).unwrap();

        let isl = &islconf.entries()[0];
        assert_eq!(isl.fp_master, Some(0xa));
        assert_eq!(isl.fast_paths, vec![(2, 1)]);
        // the far port's label is pulled back up onto the seed link too.
        assert_eq!(fpconf.entries()[0].fast_paths, vec![(2, 1)]);
    }

    #[test]
    fn first_seed_wins_a_shared_isl() {
        let mut fpconf = RfFpConf::new(vec![
            RfFpConfEntry { ct_id: 0, dp_id: 0xa, dp_port: 1, dp0_port: 0, fp_master: None, fast_paths: Vec::new() },
            RfFpConfEntry { ct_id: 0, dp_id: 0xb, dp_port: 1, dp0_port: 0, fp_master: None, fast_paths: Vec::new() },
        ]);
        let mut islconf = RfIslConf::new(vec![RfIslConfEntry {
            vm_id: 1,
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 3,
            eth_addr: mac(1),
            rem_ct: 0,
            rem_id: 0xb,
            rem_port: 4,
            rem_eth_addr: mac(2),
            fp_master: None,
            fast_paths: Vec::new(),
        }]);
        let mut config = RfConfig::new(vec![]);

        let mut alloc = FastpathAllocator::new();
        alloc.compute(&mut fpconf, &mut islconf, &mut config).unwrap();

        // dp A is listed first, so its wave claims the shared ISL before
        // dp B's wave can reach it.
        assert_eq!(islconf.entries()[0].fp_master, Some(0xa));
    }

    #[test]
    fn already_labeled_datapath_blocks_a_redundant_wave() {
        let mut fpconf = RfFpConf::new(vec![RfFpConfEntry {
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 1,
            dp0_port: 0,
            fp_master: None,
            fast_paths: Vec::new(),
        }]);
        let mut islconf = RfIslConf::new(vec![RfIslConfEntry {
            vm_id: 1,
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 3,
            eth_addr: mac(1),
            rem_ct: 0,
            rem_id: 0xb,
            rem_port: 4,
            rem_eth_addr: mac(2),
            fp_master: None,
            fast_paths: Vec::new(),
        }]);
        let mut config = RfConfig::new(vec![RfConfigEntry {
            vm_id: 2,
            vm_port: 1,
            ct_id: 0,
            dp_id: 0xb,
            dp_port: 5,
            fp_label: Some(99), // already claimed by an earlier compute() pass
        }]);

        let mut alloc = FastpathAllocator::new();
        alloc.compute(&mut fpconf, &mut islconf, &mut config).unwrap();

        assert_eq!(islconf.entries()[0].fp_master, None);
        assert!(islconf.entries()[0].fast_paths.is_empty());
    }

    #[test]
    fn label_space_exhaustion_is_reported() {
        let mut fpconf = RfFpConf::new(vec![RfFpConfEntry {
            ct_id: 0,
            dp_id: 0xa,
            dp_port: 1,
            dp0_port: 0,
            fp_master: None,
            fast_paths: Vec::new(),
        }]);
        let mut islconf = RfIslConf::new(vec![]);
        let ports = (0..10)
            .map(|i| RfConfigEntry { vm_id: 1, vm_port: i, ct_id: 0, dp_id: 0xa, dp_port: i, fp_label: None })
            .collect();
        let mut config = RfConfig::new(ports);

        let mut alloc = FastpathAllocator { next_label: LABEL_LIMIT - 1 };
        let result = alloc.compute(&mut fpconf, &mut islconf, &mut config);
        assert!(matches!(result, Err(CoordinatorError::LabelExhausted)));
    }
}
